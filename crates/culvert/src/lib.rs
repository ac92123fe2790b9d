//! Expose a remote tunnel endpoint as a standard async listener.
//!
//! A [`Tunnel`] wraps the handle a multiplexed session hands back once a
//! remote bind succeeds. It behaves like any listener: call
//! [`Tunnel::accept`] in a loop to obtain [`ProxiedConn`] byte streams, or
//! upgrade with [`Tunnel::as_http`] and serve HTTP straight over the tunnel.
//!
//! Session establishment, multiplexing, and the wire-level proxy protocol
//! live behind the [`TunnelClient`] trait and are provided by the session
//! layer, not this crate.

pub mod client;
pub mod conn;
pub mod error;
pub mod http;
pub mod session;
pub mod tunnel;

pub use client::{ProxyConn, ProxyEnvelope, RemoteBindConfig, TunnelClient};
pub use conn::{ProxiedConn, TunnelStream};
pub use error::TunnelError;
pub use http::{Handler, HttpTunnel};
pub use session::Session;
pub use tunnel::{Listener, Tunnel, DEFAULT_CLOSE_TIMEOUT};
