//! HTTP serving over a tunnel.
//!
//! [`HttpTunnel`] drives hyper's HTTP/1 connection handling with the tunnel
//! acting as the listener, so existing handler code serves traffic arriving
//! through the session exactly as it would from a local socket.

use std::convert::Infallible;
use std::future::Future;
use std::ops::Deref;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio_util::sync::CancellationToken;

use crate::error::TunnelError;
use crate::tunnel::Tunnel;

/// Handles one HTTP request arriving over a tunnel.
///
/// The shutdown token passed to [`HttpTunnel::serve`] is inserted into every
/// request's extensions, so handlers can watch it for an orderly-shutdown
/// signal.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>>;
}

/// Plain async functions and closures work as handlers
#[async_trait]
impl<F, Fut> Handler for F
where
    F: Fn(Request<Incoming>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response<Full<Bytes>>> + Send + 'static,
{
    async fn handle(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        (self)(req).await
    }
}

/// A tunnel that can also serve HTTP.
///
/// Obtained from [`Tunnel::as_http`]; derefs to [`Tunnel`], so every
/// listener operation and accessor remains available on this view.
#[derive(Clone)]
pub struct HttpTunnel {
    tunnel: Tunnel,
}

impl HttpTunnel {
    pub(crate) fn new(tunnel: Tunnel) -> Self {
        Self { tunnel }
    }

    /// Serve HTTP requests over this tunnel with `handler`.
    ///
    /// Accepts connections in a loop and dispatches requests with HTTP/1
    /// keep-alive semantics. Cancelling `shutdown` stops the accept loop and
    /// gracefully drains in-flight connections, after which this returns
    /// `Ok(())`. When accept fails instead, the terminal error comes back as
    /// [`TunnelError::ServeTerminated`] wrapping the accept failure, so a
    /// tunnel-closed shutdown stays distinguishable from other failures.
    pub async fn serve<H: Handler>(
        &self,
        shutdown: CancellationToken,
        handler: H,
    ) -> Result<(), TunnelError> {
        let handler = Arc::new(handler);
        tracing::info!("Serving HTTP on tunnel {}", self.tunnel.id());

        loop {
            let conn = tokio::select! {
                accepted = self.tunnel.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::debug!("HTTP serve loop on tunnel {} stopping: {}", self.tunnel.id(), e);
                        return Err(TunnelError::ServeTerminated(Box::new(e)));
                    }
                },
                _ = shutdown.cancelled() => {
                    tracing::info!("HTTP serve loop on tunnel {} shut down", self.tunnel.id());
                    return Ok(());
                }
            };

            let handler = handler.clone();
            let base = shutdown.clone();
            let conn_shutdown = shutdown.child_token();

            tokio::spawn(async move {
                let io = TokioIo::new(conn);
                let service = service_fn(move |mut req: Request<Incoming>| {
                    let handler = handler.clone();
                    let base = base.clone();
                    async move {
                        // Handlers observe the caller's shutdown signal via
                        // request extensions
                        req.extensions_mut().insert(base);
                        Ok::<_, Infallible>(handler.handle(req).await)
                    }
                });

                let serving = http1::Builder::new().serve_connection(io, service);
                tokio::pin!(serving);

                tokio::select! {
                    result = serving.as_mut() => {
                        if let Err(e) = result {
                            tracing::debug!("HTTP connection error: {}", e);
                        }
                    }
                    _ = conn_shutdown.cancelled() => {
                        serving.as_mut().graceful_shutdown();
                        if let Err(e) = serving.as_mut().await {
                            tracing::debug!("HTTP connection error during shutdown: {}", e);
                        }
                    }
                }
            });
        }
    }
}

impl Deref for HttpTunnel {
    type Target = Tunnel;

    fn deref(&self) -> &Tunnel {
        &self.tunnel
    }
}
