//! HTTP serving end-to-end over the tunnel adapter

use std::error::Error;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use tokio_util::sync::CancellationToken;

use culvert::{Session, Tunnel, TunnelError};
use culvert_e2e::fake_client::CLOSED_MESSAGE;
use culvert_e2e::{init_test, probe, FakeTunnelClient};

async fn hello(_req: Request<Incoming>) -> Response<Full<Bytes>> {
    Response::new(Full::new(Bytes::from_static(b"hello over tunnel")))
}

#[tokio::test]
async fn test_serve_one_request_then_surfaces_close_error() {
    init_test();

    let client = Arc::new(FakeTunnelClient::url_addressed(
        "https://demo.culvert.dev",
        "https",
    ));
    let mut peer = client.queue_duplex();
    let tunnel = Tunnel::new(Session::new("sess_http"), client.clone());

    let hits = Arc::new(AtomicUsize::new(0));
    let seen = hits.clone();
    let handler = move |_req: Request<Incoming>| {
        let seen = seen.clone();
        async move {
            seen.fetch_add(1, Ordering::SeqCst);
            Response::new(Full::new(Bytes::from_static(b"hello over tunnel")))
        }
    };

    let http = tunnel.as_http();
    let serve = tokio::spawn(async move { http.serve(CancellationToken::new(), handler).await });

    let response = probe::http_roundtrip(&mut peer, "/hello").await.unwrap();
    tracing::info!("Received {} response bytes over the tunnel", response.len());
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("hello over tunnel"));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // The session tears the tunnel down: the pending accept unblocks with
    // the close error and serve must return it, not swallow it
    client.shutdown_session();

    let err = serve.await.unwrap().unwrap_err();
    assert!(matches!(err, TunnelError::ServeTerminated(_)));

    let accept_err = err.source().expect("serve error must carry a cause");
    assert!(matches!(
        accept_err.downcast_ref::<TunnelError>(),
        Some(TunnelError::AcceptFailed(_))
    ));
    let cause = accept_err
        .source()
        .expect("cause chain must reach the client error");
    assert!(cause.to_string().contains(CLOSED_MESSAGE));
}

#[tokio::test]
async fn test_serve_accepts_connections_until_shutdown() {
    init_test();

    let client = Arc::new(FakeTunnelClient::url_addressed(
        "https://demo.culvert.dev",
        "https",
    ));
    let mut first = client.queue_duplex();
    let mut second = client.queue_duplex();
    let tunnel = Tunnel::new(Session::new("sess_http"), client);

    let shutdown = CancellationToken::new();
    let http = tunnel.as_http();
    let serve = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { http.serve(shutdown, hello).await })
    };

    for peer in [&mut first, &mut second] {
        let response = probe::http_roundtrip(peer, "/").await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("hello over tunnel"));
    }

    shutdown.cancel();
    serve.await.unwrap().expect("shutdown is not an error");
}

#[tokio::test]
async fn test_serve_returns_ok_on_shutdown_signal() {
    init_test();

    let client = Arc::new(FakeTunnelClient::url_addressed(
        "https://demo.culvert.dev",
        "https",
    ));
    let tunnel = Tunnel::new(Session::new("sess_http"), client);

    let shutdown = CancellationToken::new();
    let http = tunnel.as_http();
    let serve = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { http.serve(shutdown, hello).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    shutdown.cancel();
    serve.await.unwrap().expect("shutdown is not an error");
}

#[tokio::test]
async fn test_handlers_observe_shutdown_token_in_extensions() {
    init_test();

    let client = Arc::new(FakeTunnelClient::url_addressed(
        "https://demo.culvert.dev",
        "https",
    ));
    let mut peer = client.queue_duplex();
    let tunnel = Tunnel::new(Session::new("sess_http"), client);

    let handler = |req: Request<Incoming>| async move {
        let status = if req.extensions().get::<CancellationToken>().is_some() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let mut response = Response::new(Full::new(Bytes::new()));
        *response.status_mut() = status;
        response
    };

    let shutdown = CancellationToken::new();
    let http = tunnel.as_http();
    let serve = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { http.serve(shutdown, handler).await })
    };

    let response = probe::http_roundtrip(&mut peer, "/").await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));

    shutdown.cancel();
    serve.await.unwrap().expect("shutdown is not an error");
}
