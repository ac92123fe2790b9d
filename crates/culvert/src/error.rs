use std::io;

use thiserror::Error;

/// Errors surfaced by tunnel operations
#[derive(Debug, Error)]
pub enum TunnelError {
    /// The underlying tunnel client failed while accepting a proxied
    /// connection. Carries the client's error as its cause.
    #[error("failed to accept a proxied connection: {0}")]
    AcceptFailed(#[source] io::Error),

    /// The tunnel-close control exchange failed.
    #[error("failed to close tunnel: {0}")]
    CloseFailed(#[source] io::Error),

    /// The close wait was cancelled before the remote acknowledged.
    #[error("tunnel close cancelled before acknowledgement")]
    CloseCancelled,

    /// The HTTP serve loop stopped on a tunnel error.
    #[error("serve loop terminated: {0}")]
    ServeTerminated(#[source] Box<TunnelError>),
}
