//! Minimal HTTP/1.1 probe speaking raw bytes over the test end of an
//! accepted connection

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

/// Send a GET request for `target` and read the full response.
///
/// Sends `connection: close` so the server ends the exchange after one
/// response and the read runs to EOF.
pub async fn http_roundtrip(stream: &mut DuplexStream, target: &str) -> Result<String> {
    let request = format!("GET {target} HTTP/1.1\r\nhost: tunnel.test\r\nconnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    Ok(String::from_utf8(response)?)
}
