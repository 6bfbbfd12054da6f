use std::time::Duration;

use super::Layer;
use super::result::{Payload, ProbeResult, ReachabilityPayload};
use super::tcp::connect_ms;
use super::timing::round2;

/// Port checked by the reachability layer. Fixed so the figure means "can we reach the host".
pub const REACHABILITY_PORT: u16 = 443;

const METHOD: &str = "tcp_connect";

/// Measures TCP connect latency to `host:port` and closes the connection without sending data.
pub async fn check(host: &str, port: u16, timeout: Duration) -> ProbeResult {
    let outcome = connect_ms(host, port, timeout).await.map(|latency| {
        Payload::Reachability(ReachabilityPayload {
            latency_ms: round2(latency),
            method: METHOD.to_string(),
            port,
        })
    });
    ProbeResult::from_outcome(Layer::Reachability, outcome)
}
