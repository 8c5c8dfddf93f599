use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::Uri;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::error::{DeployError, DeployResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Plain-HTTP GET returning only the status code. Health endpoints are all
/// local, so TLS is not supported.
pub async fn get_status(url: &str) -> DeployResult<u16> {
    match tokio::time::timeout(REQUEST_TIMEOUT, fetch(url)).await {
        Ok(result) => result,
        Err(_) => Err(http_err(url, "request timed out")),
    }
}

async fn fetch(url: &str) -> DeployResult<u16> {
    let uri: Uri = url.parse().map_err(|e| http_err(url, e))?;

    if uri.scheme_str() != Some("http") {
        return Err(http_err(url, "only http:// URLs are supported"));
    }
    let host = uri.host().ok_or_else(|| http_err(url, "missing host"))?;
    // IPv6 literals come back as `[::1]`.
    let connect_host = host.trim_start_matches('[').trim_end_matches(']');
    let port = uri.port_u16().unwrap_or(80);
    let authority = uri
        .authority()
        .map(|a| a.to_string())
        .unwrap_or_else(|| host.to_string());
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");

    let stream = TcpStream::connect((connect_host, port))
        .await
        .map_err(|e| http_err(url, e))?;
    let io = TokioIo::new(stream);

    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| http_err(url, e))?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            warn!("health probe connection error: {}", e);
        }
    });

    let req = hyper::Request::builder()
        .method("GET")
        .uri(path)
        .header("Host", authority)
        .body(Empty::<Bytes>::new())
        .map_err(|e| http_err(url, e))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| http_err(url, e))?;
    let status = resp.status().as_u16();

    // Drain so the server sees a clean close.
    let _ = resp.into_body().collect().await;

    debug!("GET {} -> {}", url, status);
    Ok(status)
}

fn http_err(url: &str, reason: impl ToString) -> DeployError {
    DeployError::Http {
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
