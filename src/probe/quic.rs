use std::time::Duration;

use super::Layer;
use super::error::ProbeError;
use super::process::CommandRunner;
use super::result::{Payload, ProbeResult, QuicPayload};
use super::timing::timed;

/// Feature name curl lists in `curl -V` when built with HTTP/3.
const HTTP3_MARKER: &str = "HTTP3";

/// Timeout for the capability check; `curl -V` does no network I/O.
const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_QUIC_TIMEOUT: Duration = Duration::from_secs(10);

/// Checks whether the HTTP client advertises HTTP/3 support.
pub async fn supports_http3<R: CommandRunner>(runner: &R, curl: &str) -> Result<(), ProbeError> {
    let version = runner
        .run(curl, &["-V".to_string()], None, VERSION_TIMEOUT)
        .await
        .map_err(|e| ProbeError::Unsupported(format!("{curl} unavailable: {e}")))?;

    if version.stdout.contains(HTTP3_MARKER) {
        Ok(())
    } else {
        Err(ProbeError::Unsupported(format!(
            "{curl} built without HTTP/3 support"
        )))
    }
}

/// Times an HTTP/3 request to `https://<domain>` with the external client, if it can.
pub async fn request<R: CommandRunner>(
    runner: &R,
    curl: &str,
    domain: &str,
    timeout: Duration,
) -> ProbeResult {
    ProbeResult::from_outcome(Layer::Quic, measure(runner, curl, domain, timeout).await)
}

async fn measure<R: CommandRunner>(
    runner: &R,
    curl: &str,
    domain: &str,
    timeout: Duration,
) -> Result<Payload, ProbeError> {
    supports_http3(runner, curl).await?;

    let args: Vec<String> = [
        "--http3-only",
        "-s",
        "-o",
        "/dev/null",
        "-w",
        "%{http_code}",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain(std::iter::once(format!("https://{domain}")))
    .collect();

    let (output, total_time_ms) = timed(runner.run(curl, &args, None, timeout)).await;
    let output = output?;

    if !output.success {
        let stderr = output.stderr.trim();
        return Err(ProbeError::Subprocess(if stderr.is_empty() {
            format!("{curl} exited with status {:?}", output.code)
        } else {
            stderr.to_string()
        }));
    }

    Ok(Payload::Quic(QuicPayload {
        http_code: output.stdout.trim().to_string(),
        total_time_ms,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::error::ErrorKind;
    use crate::probe::process::test::{FakeRunner, failed_output, ok_output};
    use crate::probe::result::ProbeStatus;

    const CURL_H3: &str = "curl 8.9.1 (x86_64-pc-linux-gnu) libcurl/8.9.1 OpenSSL/3.2.2 nghttp3/1.4.0\n\
                           Features: alt-svc AsynchDNS HTTP2 HTTP3 HTTPS-proxy IPv6 SSL\n";
    const CURL_PLAIN: &str = "curl 7.88.1 (x86_64-pc-linux-gnu) libcurl/7.88.1 OpenSSL/3.0.11\n\
                              Features: alt-svc AsynchDNS HTTP2 HTTPS-proxy IPv6 SSL\n";

    #[tokio::test]
    async fn test_without_http3_is_unsupported_and_skips_request() {
        let runner = FakeRunner::with_replies(vec![ok_output(CURL_PLAIN)]);
        let result = request(&runner, "curl", "example.com", DEFAULT_QUIC_TIMEOUT).await;

        assert_eq!(result.status, ProbeStatus::Unsupported);
        assert_eq!(result.error(), Some("curl built without HTTP/3 support"));
        assert_eq!(runner.calls(), vec![vec!["curl", "-V"]]);
    }

    #[tokio::test]
    async fn test_with_http3_reports_code() {
        let runner = FakeRunner::with_replies(vec![ok_output(CURL_H3), ok_output("200")]);
        let result = request(&runner, "curl", "example.com", DEFAULT_QUIC_TIMEOUT).await;

        assert_eq!(result.status, ProbeStatus::Ok);
        let calls = runner.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1].last().map(String::as_str), Some("https://example.com"));
        assert!(calls[1].contains(&"--http3-only".to_string()));
        match result.payload() {
            Some(Payload::Quic(p)) => {
                assert_eq!(p.http_code, "200");
                assert!(p.total_time_ms >= 0.0);
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_request_failure_is_error() {
        let runner = FakeRunner::with_replies(vec![
            ok_output(CURL_H3),
            failed_output(7, "curl: (7) Failed to connect\n"),
        ]);
        let result = request(&runner, "curl", "example.com", DEFAULT_QUIC_TIMEOUT).await;

        assert_eq!(result.status, ProbeStatus::Error);
        assert_eq!(result.error(), Some("curl: (7) Failed to connect"));
    }

    #[tokio::test]
    async fn test_request_timeout_is_error() {
        let runner = FakeRunner::with_replies(vec![
            ok_output(CURL_H3),
            Err(ProbeError::Timeout {
                phase: "subprocess",
                after: DEFAULT_QUIC_TIMEOUT,
            }),
        ]);
        let result = request(&runner, "curl", "example.com", DEFAULT_QUIC_TIMEOUT).await;

        assert_eq!(result.status, ProbeStatus::Error);
        assert_eq!(result.failure_info().map(|f| f.kind), Some(ErrorKind::Timeout));
    }

    #[tokio::test]
    async fn test_missing_client_is_unsupported() {
        let runner = FakeRunner::with_replies(vec![Err(ProbeError::Subprocess(
            "failed to run curl: No such file or directory (os error 2)".into(),
        ))]);
        let result = request(&runner, "curl", "example.com", DEFAULT_QUIC_TIMEOUT).await;
        assert_eq!(result.status, ProbeStatus::Unsupported);
        assert_eq!(runner.calls().len(), 1);
    }
}
