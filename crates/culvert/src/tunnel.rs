use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::client::TunnelClient;
use crate::conn::ProxiedConn;
use crate::error::TunnelError;
use crate::http::HttpTunnel;
use crate::session::Session;

/// How long [`Tunnel::close`] waits for the remote acknowledgement before
/// giving up
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Anything that hands out accepted connections like a socket listener.
///
/// [`Tunnel`] implements this, so it can be plugged into any server loop
/// that is generic over its listener without changes.
#[async_trait]
pub trait Listener: Send + Sync {
    /// Wait for the next inbound connection
    async fn accept(&self) -> Result<ProxiedConn, TunnelError>;

    /// Advertised local address of this listener
    fn local_addr(&self) -> SocketAddr;

    /// Stop accepting and release the listener
    async fn close(&self) -> Result<(), TunnelError>;
}

/// One live tunnel bound into a session, usable as a listener.
///
/// Cloning is cheap; every clone is a view of the same tunnel. A closed
/// tunnel is terminal: to listen again, start a new tunnel on the session.
#[derive(Clone)]
pub struct Tunnel {
    inner: Arc<TunnelInner>,
}

struct TunnelInner {
    session: Session,
    client: Arc<dyn TunnelClient>,
}

impl Tunnel {
    /// Wrap a live tunnel client handle together with its owning session
    pub fn new(session: Session, client: Arc<dyn TunnelClient>) -> Self {
        Self {
            inner: Arc::new(TunnelInner { session, client }),
        }
    }

    /// Wait for the next proxied connection.
    ///
    /// Suspends the calling task until a connection arrives or the
    /// underlying client reports an error (including the session closing).
    /// Failures come back as [`TunnelError::AcceptFailed`] with the client's
    /// error as the cause.
    pub async fn accept(&self) -> Result<ProxiedConn, TunnelError> {
        let conn = self
            .inner
            .client
            .accept()
            .await
            .map_err(TunnelError::AcceptFailed)?;
        tracing::debug!(
            "Tunnel {} accepted connection from {}",
            self.id(),
            conn.envelope.client_addr
        );
        Ok(ProxiedConn::new(conn))
    }

    /// Advertised local address of this tunnel
    pub fn local_addr(&self) -> SocketAddr {
        self.inner.client.addr()
    }

    /// Close the tunnel, waiting at most [`DEFAULT_CLOSE_TIMEOUT`] for the
    /// remote acknowledgement. See [`Tunnel::close_with_cancel`] for finer
    /// control over the wait.
    pub async fn close(&self) -> Result<(), TunnelError> {
        let cancel = CancellationToken::new();
        let deadline = cancel.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(DEFAULT_CLOSE_TIMEOUT).await;
            deadline.cancel();
        });

        let result = self.close_with_cancel(cancel).await;
        timer.abort();
        result
    }

    /// Close the tunnel, bounding the wait with `cancel`.
    ///
    /// Closing sends a "close" control message over the session and waits
    /// for acknowledgement, which is subject to network latency and packet
    /// loss. Once `cancel` trips this returns [`TunnelError::CloseCancelled`]
    /// promptly even if the underlying close has not come back; the close
    /// message may still take effect on the remote side.
    pub async fn close_with_cancel(&self, cancel: CancellationToken) -> Result<(), TunnelError> {
        tokio::select! {
            result = self.inner.client.close() => {
                match result {
                    Ok(()) => {
                        tracing::info!("Tunnel {} closed", self.id());
                        Ok(())
                    }
                    Err(e) => Err(TunnelError::CloseFailed(e)),
                }
            }
            _ = cancel.cancelled() => {
                tracing::debug!("Tunnel {} close cancelled before acknowledgement", self.id());
                Err(TunnelError::CloseCancelled)
            }
        }
    }

    /// This tunnel's identifier, assigned by the remote side at bind time
    pub fn id(&self) -> String {
        self.inner.client.id()
    }

    /// Description of the local target this tunnel forwards to
    pub fn forwards_to(&self) -> String {
        self.inner.client.forwards_to()
    }

    /// Caller-supplied metadata from the bind configuration
    pub fn metadata(&self) -> String {
        self.inner.client.remote_bind_config().metadata
    }

    /// This tunnel's protocol. Empty for label-addressed tunnels.
    pub fn proto(&self) -> String {
        self.inner.client.remote_bind_config().config_proto
    }

    /// Public URL of this tunnel. Empty for label-addressed tunnels.
    pub fn url(&self) -> String {
        self.inner.client.remote_bind_config().url
    }

    /// Routing labels for this tunnel. Empty for URL-addressed tunnels.
    pub fn labels(&self) -> HashMap<String, String> {
        self.inner.client.remote_bind_config().labels
    }

    /// The session this tunnel was started on.
    ///
    /// Non-owning back-reference: useful for starting additional tunnels or
    /// inspecting session-level state, never for tearing the session down.
    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// View of this same tunnel that can also serve HTTP.
    ///
    /// A capability upgrade, not a new tunnel: the returned view shares all
    /// underlying state with `self`.
    pub fn as_http(&self) -> HttpTunnel {
        HttpTunnel::new(self.clone())
    }
}

#[async_trait]
impl Listener for Tunnel {
    async fn accept(&self) -> Result<ProxiedConn, TunnelError> {
        Tunnel::accept(self).await
    }

    fn local_addr(&self) -> SocketAddr {
        Tunnel::local_addr(self)
    }

    async fn close(&self) -> Result<(), TunnelError> {
        Tunnel::close(self).await
    }
}
