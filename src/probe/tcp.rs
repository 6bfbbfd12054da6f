use std::time::Duration;

use tokio::net::TcpStream;

use super::Layer;
use super::error::ProbeError;
use super::result::{Payload, ProbeResult, TcpPayload};
use super::timing::timed;

/// Default port for the plaintext handshake timing.
pub const DEFAULT_TCP_PORT: u16 = 80;

/// Opens a TCP connection and returns the connect time in milliseconds. The stream is
/// dropped (closed) before returning.
pub async fn connect_ms(host: &str, port: u16, timeout: Duration) -> Result<f64, ProbeError> {
    let (connected, elapsed) =
        timed(tokio::time::timeout(timeout, TcpStream::connect((host, port)))).await;

    let stream = connected
        .map_err(|_| ProbeError::Timeout {
            phase: "connect",
            after: timeout,
        })?
        .map_err(|e| ProbeError::connect(&e))?;
    drop(stream);

    Ok(elapsed)
}

/// Measures TCP connection establishment time to `host:port`.
pub async fn handshake(host: &str, port: u16, timeout: Duration) -> ProbeResult {
    let outcome = connect_ms(host, port, timeout).await.map(|connect_time_ms| {
        Payload::Tcp(TcpPayload {
            connect_time_ms,
            port,
        })
    });
    ProbeResult::from_outcome(Layer::Tcp, outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::error::ErrorKind;
    use crate::probe::result::ProbeStatus;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_handshake_to_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let result = handshake("127.0.0.1", port, Duration::from_secs(3)).await;
        assert_eq!(result.status, ProbeStatus::Ok);
        assert!(result.headline_latency().is_some());
    }

    #[tokio::test]
    async fn test_refused_connection_is_connect_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let result = handshake("127.0.0.1", port, Duration::from_secs(3)).await;
        assert_eq!(result.status, ProbeStatus::Error);
        assert_eq!(
            result.failure_info().map(|f| f.kind),
            Some(ErrorKind::ConnectFailure)
        );
    }

    #[tokio::test]
    async fn test_unresolvable_host_fails() {
        let result = handshake("host.invalid", 80, Duration::from_secs(3)).await;
        assert_eq!(result.status, ProbeStatus::Error);
        assert!(result.error().is_some());
    }
}
