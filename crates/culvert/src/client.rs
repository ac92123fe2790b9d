//! Contract toward the session-side tunnel client.
//!
//! The session layer owns connection setup, authentication, heartbeats and
//! reconnection. Once a bind succeeds it hands this crate a [`TunnelClient`]
//! handle, and everything here is expressed against that trait.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use bytes::Bytes;

use crate::conn::TunnelStream;

/// Snapshot of the configuration the remote side bound a tunnel with.
///
/// A tunnel is either URL-addressed (`url`/`config_proto` populated, `labels`
/// empty) or label-addressed (`labels` populated, the others empty).
#[derive(Debug, Clone, Default)]
pub struct RemoteBindConfig {
    /// Public address of the tunnel; empty for label-addressed tunnels
    pub url: String,
    /// Protocol the tunnel was bound with; empty for label-addressed tunnels
    pub config_proto: String,
    /// Caller-supplied opaque metadata string
    pub metadata: String,
    /// Routing labels; empty for URL-addressed tunnels
    pub labels: HashMap<String, String>,
}

/// Per-connection metadata attached by the tunneling protocol.
///
/// Opaque to this crate: it is carried to the caller untouched and never
/// interpreted here.
#[derive(Debug, Clone, Default)]
pub struct ProxyEnvelope {
    /// Address of the remote peer that initiated the connection
    pub client_addr: String,
    /// Protocol the connection arrived over
    pub proto: String,
    /// Raw envelope bytes as received from the wire
    pub header: Bytes,
}

/// One accepted connection as handed over by the tunnel client
pub struct ProxyConn {
    /// The raw duplex stream; ownership transfers to the caller on accept
    pub stream: Box<dyn TunnelStream>,
    /// Envelope describing the originating connection context
    pub envelope: ProxyEnvelope,
}

/// The session-side handle for one bound tunnel.
///
/// Implementations must be safe to share across tasks. Whether concurrent
/// `accept` calls are allowed is the implementation's contract; this crate
/// adds no synchronization of its own.
#[async_trait]
pub trait TunnelClient: Send + Sync {
    /// Wait for the next proxied connection. Suspends the calling task until
    /// one arrives or the session surfaces an error (including the session
    /// itself closing).
    async fn accept(&self) -> io::Result<ProxyConn>;

    /// Send a tunnel-close control message over the session and wait for
    /// acknowledgement. A successful return guarantees no further
    /// connections will be handed out.
    async fn close(&self) -> io::Result<()>;

    /// Advertised local address for this tunnel
    fn addr(&self) -> SocketAddr;

    /// Identifier assigned by the remote side at bind time
    fn id(&self) -> String;

    /// Free-text description of the local target this tunnel forwards to
    fn forwards_to(&self) -> String;

    /// Current bind configuration. Callers must not cache this: the
    /// collaborator may update it out-of-band.
    fn remote_bind_config(&self) -> RemoteBindConfig;
}
