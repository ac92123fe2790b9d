use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use crate::client::{ProxyConn, ProxyEnvelope};

/// Byte-stream requirements for a proxied connection's transport
pub trait TunnelStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> TunnelStream for T {}

/// An accepted connection together with its proxy envelope.
///
/// Reads and writes go straight to the underlying stream; payload bytes are
/// never touched by this crate. The envelope is available for callers that
/// need the originating connection context.
pub struct ProxiedConn {
    stream: Box<dyn TunnelStream>,
    envelope: ProxyEnvelope,
}

impl ProxiedConn {
    pub(crate) fn new(conn: ProxyConn) -> Self {
        Self {
            stream: conn.stream,
            envelope: conn.envelope,
        }
    }

    /// Metadata the tunneling protocol attached to this connection
    pub fn envelope(&self) -> &ProxyEnvelope {
        &self.envelope
    }
}

impl std::fmt::Debug for ProxiedConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxiedConn")
            .field("envelope", &self.envelope)
            .finish_non_exhaustive()
    }
}

impl AsyncRead for ProxiedConn {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for ProxiedConn {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.stream).poll_write(cx, buf)
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.stream).poll_shutdown(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_reads_and_writes_pass_through() {
        let (near, far) = tokio::io::duplex(64);
        let mut conn = ProxiedConn::new(ProxyConn {
            stream: Box::new(near),
            envelope: ProxyEnvelope::default(),
        });

        let mut far = far;
        far.write_all(b"ping").await.unwrap();

        let mut buf = [0u8; 4];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        conn.write_all(b"pong").await.unwrap();
        let mut buf = [0u8; 4];
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn test_envelope_is_carried_untouched() {
        let (near, _far) = tokio::io::duplex(64);
        let conn = ProxiedConn::new(ProxyConn {
            stream: Box::new(near),
            envelope: ProxyEnvelope {
                client_addr: "203.0.113.10:54321".to_string(),
                proto: "tcp".to_string(),
                header: Bytes::from_static(b"\x01\x02"),
            },
        });

        assert_eq!(conn.envelope().client_addr, "203.0.113.10:54321");
        assert_eq!(conn.envelope().proto, "tcp");
        assert_eq!(conn.envelope().header.as_ref(), b"\x01\x02");
    }
}
