use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, lookup_host};
use tokio_native_tls::TlsConnector as TokioTlsConnector;

use super::Layer;
use super::error::ProbeError;
use super::result::{HttpPayload, HttpTimings, Payload, ProbeResult};
use super::timing::{Stopwatch, timed};

pub const DEFAULT_HTTP_PORT: u16 = 443;
pub const DEFAULT_HTTP_PATH: &str = "/";

/// Only the head of the response is read; the body is never drained.
const RESPONSE_READ_SIZE: usize = 4096;

/// Minimal HTTP/1.1 GET that asks the server to close after responding.
pub fn build_request(domain: &str, path: &str) -> String {
    format!("GET {path} HTTP/1.1\r\nHost: {domain}\r\nConnection: close\r\n\r\n")
}

/// First line of the decoded response bytes.
pub fn parse_status_line(response: &[u8]) -> Result<String, ProbeError> {
    String::from_utf8_lossy(response)
        .lines()
        .next()
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .ok_or_else(|| ProbeError::Protocol("empty response from server".to_string()))
}

/// Which addresses `lookup_host` returned; IPv4 is preferred when both families are present.
fn pick_address(addrs: impl IntoIterator<Item = SocketAddr>) -> Option<SocketAddr> {
    let addrs: Vec<SocketAddr> = addrs.into_iter().collect();
    addrs
        .iter()
        .find(|a| a.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
}

fn timeout_in(phase: &'static str, after: Duration) -> impl FnOnce(tokio::time::error::Elapsed) -> ProbeError {
    move |_| ProbeError::Timeout { phase, after }
}

/// Performs an HTTPS GET over a raw socket, timing each phase separately.
pub async fn request(
    connector: &TokioTlsConnector,
    domain: &str,
    path: &str,
    port: u16,
    timeout: Duration,
) -> ProbeResult {
    ProbeResult::from_outcome(
        Layer::Http,
        phases(connector, domain, path, port, timeout).await,
    )
}

async fn phases(
    connector: &TokioTlsConnector,
    domain: &str,
    path: &str,
    port: u16,
    timeout: Duration,
) -> Result<Payload, ProbeError> {
    let total = Stopwatch::start();
    let mut timings = HttpTimings::default();

    let (addrs, dns) = timed(tokio::time::timeout(timeout, lookup_host((domain, port)))).await;
    let addr = addrs
        .map_err(timeout_in("dns lookup", timeout))?
        .map_err(|e| ProbeError::resolution(&e))
        .map(pick_address)?
        .ok_or_else(|| ProbeError::Resolution(format!("no addresses found for {domain}")))?;
    timings.dns = dns;

    let (stream, tcp) = timed(tokio::time::timeout(timeout, TcpStream::connect(addr))).await;
    let stream = stream
        .map_err(timeout_in("connect", timeout))?
        .map_err(|e| ProbeError::connect(&e))?;
    timings.tcp = tcp;

    let (tls_stream, tls) = timed(tokio::time::timeout(timeout, connector.connect(domain, stream))).await;
    let mut tls_stream = tls_stream
        .map_err(timeout_in("tls handshake", timeout))?
        .map_err(|e| ProbeError::handshake(&e))?;
    timings.tls = tls;

    let request = build_request(domain, path);
    let (sent, request_ms) =
        timed(tokio::time::timeout(timeout, tls_stream.write_all(request.as_bytes()))).await;
    sent.map_err(timeout_in("request", timeout))?
        .map_err(|e| ProbeError::connect(&e))?;
    timings.request = request_ms;

    let mut buf = vec![0u8; RESPONSE_READ_SIZE];
    let (read, response_ms) = timed(tokio::time::timeout(timeout, tls_stream.read(&mut buf))).await;
    let n = read
        .map_err(timeout_in("response", timeout))?
        .map_err(|e| ProbeError::Protocol(super::error::report(&e)))?;
    timings.response = response_ms;

    timings.total = total.elapsed_ms();
    let _ = tokio::time::timeout(timeout, tls_stream.shutdown()).await;
    drop(tls_stream);

    let status_line = parse_status_line(&buf[..n])?;
    log::debug!("{} responded '{}' in {:.2}ms", domain, status_line, timings.total);

    Ok(Payload::Http(HttpPayload {
        ip: addr.ip().to_string(),
        status_line,
        timings,
    }))
}
