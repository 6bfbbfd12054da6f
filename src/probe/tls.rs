use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::net::TcpStream;
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use x509_parser::parse_x509_certificate;
use x509_parser::x509::X509Name;

use super::Layer;
use super::error::ProbeError;
use super::result::{CertificateInfo, Payload, ProbeResult};

pub const DEFAULT_TLS_PORT: u16 = 443;

const UNKNOWN: &str = "Unknown";

/// A certificate is expired once the evaluation instant is strictly past `not_after`.
pub fn is_expired(not_after: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now > not_after
}

fn common_name(name: &X509Name<'_>) -> String {
    name.iter_common_name()
        .next()
        .and_then(|cn| cn.as_str().ok())
        .unwrap_or(UNKNOWN)
        .to_string()
}

fn date_of(timestamp: i64) -> Result<DateTime<Utc>, ProbeError> {
    DateTime::from_timestamp(timestamp, 0)
        .ok_or_else(|| ProbeError::Protocol(format!("certificate date out of range: {timestamp}")))
}

/// Extracts subject, issuer and validity window from a DER certificate.
pub fn certificate_info(der: &[u8], now: DateTime<Utc>) -> Result<CertificateInfo, ProbeError> {
    let (_, parsed) = parse_x509_certificate(der)
        .map_err(|e| ProbeError::Protocol(format!("failed to parse certificate: {e}")))?;

    let validity = parsed.validity();
    let not_before = date_of(validity.not_before.timestamp())?;
    let not_after = date_of(validity.not_after.timestamp())?;

    Ok(CertificateInfo {
        subject: common_name(parsed.subject()),
        issuer: common_name(parsed.issuer()),
        not_before: not_before.format("%Y-%m-%d").to_string(),
        not_after: not_after.format("%Y-%m-%d").to_string(),
        expired: is_expired(not_after, now),
    })
}

/// Handshakes with `domain:port` using system trust and reports the peer certificate.
pub async fn inspect(
    connector: &TokioTlsConnector,
    domain: &str,
    port: u16,
    timeout: Duration,
) -> ProbeResult {
    ProbeResult::from_outcome(Layer::Tls, fetch(connector, domain, port, timeout).await)
}

async fn fetch(
    connector: &TokioTlsConnector,
    domain: &str,
    port: u16,
    timeout: Duration,
) -> Result<Payload, ProbeError> {
    let stream = tokio::time::timeout(timeout, TcpStream::connect((domain, port)))
        .await
        .map_err(|_| ProbeError::Timeout {
            phase: "connect",
            after: timeout,
        })?
        .map_err(|e| ProbeError::connect(&e))?;

    let tls_stream = tokio::time::timeout(timeout, connector.connect(domain, stream))
        .await
        .map_err(|_| ProbeError::Timeout {
            phase: "tls handshake",
            after: timeout,
        })?
        .map_err(|e| ProbeError::handshake(&e))?;

    let cert_der = tls_stream
        .get_ref()
        .peer_certificate()
        .map_err(|e| ProbeError::handshake(&e))?
        .ok_or_else(|| ProbeError::Handshake("peer presented no certificate".to_string()))?
        .to_der()
        .map_err(|e| ProbeError::Protocol(format!("failed to encode certificate: {e}")))?;
    drop(tls_stream);

    let info = certificate_info(&cert_der, Utc::now())?;
    log::debug!(
        "Certificate for {}: subject={} issuer={} not_after={}",
        domain,
        info.subject,
        info.issuer,
        info.not_after
    );
    Ok(Payload::Tls(info))
}
