//! Scripted tunnel client for exercising the adapter without a session
//!
//! Accept outcomes are queued up front. Once the queue drains, `accept`
//! blocks the way a real client would until the tunnel is closed, then
//! reports the close error on every subsequent call.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tokio::io::DuplexStream;
use tokio_util::sync::CancellationToken;

use culvert::{ProxyConn, ProxyEnvelope, RemoteBindConfig, TunnelClient};

/// Error message `accept` reports once the tunnel is closed
pub const CLOSED_MESSAGE: &str = "tunnel closed by session";

enum ScriptedAccept {
    Conn(ProxyConn),
    Err(io::Error),
}

/// A scripted stand-in for the session-side tunnel client
pub struct FakeTunnelClient {
    queue: Mutex<VecDeque<ScriptedAccept>>,
    closed: CancellationToken,
    bind_config: RwLock<RemoteBindConfig>,
    addr: SocketAddr,
    id: String,
    forwards_to: String,
    /// When set, `close` never acknowledges (for cancellation tests)
    hang_on_close: AtomicBool,
    close_error: Mutex<Option<io::Error>>,
}

impl FakeTunnelClient {
    fn with_config(bind_config: RemoteBindConfig) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            closed: CancellationToken::new(),
            bind_config: RwLock::new(bind_config),
            addr: SocketAddr::from(([127, 0, 0, 1], 40404)),
            id: "tn_scripted_1".to_string(),
            forwards_to: "localhost:8080".to_string(),
            hang_on_close: AtomicBool::new(false),
            close_error: Mutex::new(None),
        }
    }

    /// A tunnel reachable at a public URL
    pub fn url_addressed(url: &str, proto: &str) -> Self {
        Self::with_config(RemoteBindConfig {
            url: url.to_string(),
            config_proto: proto.to_string(),
            ..Default::default()
        })
    }

    /// A tunnel reachable via label matching instead of a URL
    pub fn label_addressed(labels: HashMap<String, String>) -> Self {
        Self::with_config(RemoteBindConfig {
            labels,
            ..Default::default()
        })
    }

    /// Mutate the bind config out-of-band, as the session may
    pub fn set_metadata(&self, metadata: &str) {
        self.bind_config.write().metadata = metadata.to_string();
    }

    /// Queue a connection for the next `accept`; returns the peer end of
    /// the stream for the test to speak through
    pub fn queue_duplex(&self) -> DuplexStream {
        self.queue_duplex_with_envelope(ProxyEnvelope {
            client_addr: "203.0.113.10:54321".to_string(),
            proto: "http".to_string(),
            header: Bytes::new(),
        })
    }

    pub fn queue_duplex_with_envelope(&self, envelope: ProxyEnvelope) -> DuplexStream {
        let (near, far) = tokio::io::duplex(64 * 1024);
        self.queue.lock().push_back(ScriptedAccept::Conn(ProxyConn {
            stream: Box::new(near),
            envelope,
        }));
        far
    }

    /// Queue an accept failure
    pub fn queue_accept_error(&self, err: io::Error) {
        self.queue.lock().push_back(ScriptedAccept::Err(err));
    }

    /// Make the next `close` call fail with `err` and leave the tunnel open
    pub fn fail_close(&self, err: io::Error) {
        *self.close_error.lock() = Some(err);
    }

    /// Make `close` wait forever for an acknowledgement that never comes
    pub fn hang_close(&self) {
        self.hang_on_close.store(true, Ordering::SeqCst);
    }

    /// Tear the tunnel down from the session side, without a close call.
    /// Pending and subsequent accepts report [`CLOSED_MESSAGE`].
    pub fn shutdown_session(&self) {
        tracing::debug!("Scripted client {}: session torn down", self.id);
        self.closed.cancel();
    }

    fn closed_error(&self) -> io::Error {
        io::Error::new(io::ErrorKind::ConnectionAborted, CLOSED_MESSAGE)
    }
}

#[async_trait]
impl TunnelClient for FakeTunnelClient {
    async fn accept(&self) -> io::Result<ProxyConn> {
        // Once closed, nothing is handed out, queued or not
        if self.closed.is_cancelled() {
            return Err(self.closed_error());
        }
        if let Some(next) = self.queue.lock().pop_front() {
            return match next {
                ScriptedAccept::Conn(conn) => Ok(conn),
                ScriptedAccept::Err(err) => Err(err),
            };
        }
        self.closed.cancelled().await;
        Err(self.closed_error())
    }

    async fn close(&self) -> io::Result<()> {
        if self.hang_on_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(err) = self.close_error.lock().take() {
            return Err(err);
        }
        self.closed.cancel();
        Ok(())
    }

    fn addr(&self) -> SocketAddr {
        self.addr
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn forwards_to(&self) -> String {
        self.forwards_to.clone()
    }

    fn remote_bind_config(&self) -> RemoteBindConfig {
        self.bind_config.read().clone()
    }
}
