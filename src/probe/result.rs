use serde::Serialize;

use super::Layer;
use super::error::{ErrorKind, ProbeError};

/// Status vocabulary across all layers. Each layer uses a subset, see [`Layer::statuses`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Ok,
    Reachable,
    Unreachable,
    Error,
    Unsupported,
}

/// Outcome of one layer: a status plus either the layer payload or a tagged error.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeResult {
    pub status: ProbeStatus,
    #[serde(flatten)]
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simulated: Option<Simulation>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Success(Payload),
    Failure(Failure),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub error: String,
}

/// Marker left by the fault injector so consumers can tell real from simulated degradation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Simulation {
    Latency { delay_ms: u64 },
    Failure,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Dns(DnsPayload),
    Reachability(ReachabilityPayload),
    Traceroute(TraceroutePayload),
    Tcp(TcpPayload),
    Tls(CertificateInfo),
    Http(HttpPayload),
    Quic(QuicPayload),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DnsPayload {
    pub ips: Vec<String>,
    pub latency: f64,
    pub ttl: u32,
    pub cache: CacheInference,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    CacheHit,
    CacheMiss,
}

/// Guess about resolver caching derived from the record TTL. Not a cache inspection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheInference {
    pub status: CacheStatus,
    pub reason: String,
    pub heuristic: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReachabilityPayload {
    pub latency_ms: f64,
    pub method: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceroutePayload {
    pub hops: Vec<HopRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HopRecord {
    pub hop: u32,
    pub host: String,
    pub ip: String,
    pub latency: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TcpPayload {
    pub connect_time_ms: f64,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CertificateInfo {
    pub subject: String,
    pub issuer: String,
    pub not_before: String,
    pub not_after: String,
    pub expired: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpPayload {
    pub ip: String,
    pub status_line: String,
    pub timings: HttpTimings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HttpTimings {
    pub dns: f64,
    pub tcp: f64,
    pub tls: f64,
    pub request: f64,
    pub response: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuicPayload {
    pub http_code: String,
    pub total_time_ms: f64,
}

impl Payload {
    /// The single latency this layer contributes to the session summary, if it has one.
    pub fn headline_latency(&self) -> Option<f64> {
        match self {
            Payload::Dns(p) => Some(p.latency),
            Payload::Reachability(p) => Some(p.latency_ms),
            Payload::Tcp(p) => Some(p.connect_time_ms),
            Payload::Http(p) => Some(p.timings.total),
            Payload::Traceroute(_) | Payload::Tls(_) | Payload::Quic(_) => None,
        }
    }

    pub fn headline_latency_mut(&mut self) -> Option<&mut f64> {
        match self {
            Payload::Dns(p) => Some(&mut p.latency),
            Payload::Reachability(p) => Some(&mut p.latency_ms),
            Payload::Tcp(p) => Some(&mut p.connect_time_ms),
            Payload::Http(p) => Some(&mut p.timings.total),
            Payload::Traceroute(_) | Payload::Tls(_) | Payload::Quic(_) => None,
        }
    }
}

impl ProbeResult {
    /// Builds the result for `layer`, picking the status from the layer's vocabulary.
    pub fn from_outcome(layer: Layer, outcome: Result<Payload, ProbeError>) -> Self {
        match outcome {
            Ok(payload) => Self::success(layer, payload),
            Err(err) => Self::failure(layer, &err),
        }
    }

    pub fn success(layer: Layer, payload: Payload) -> Self {
        Self {
            status: layer.success_status(),
            outcome: Outcome::Success(payload),
            simulated: None,
        }
    }

    pub fn failure(layer: Layer, err: &ProbeError) -> Self {
        let status = match err {
            ProbeError::Unsupported(_) if layer == Layer::Quic => ProbeStatus::Unsupported,
            _ => layer.failure_status(),
        };
        Self {
            status,
            outcome: Outcome::Failure(Failure {
                kind: err.kind(),
                error: err.to_string(),
            }),
            simulated: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Success(_))
    }

    pub fn payload(&self) -> Option<&Payload> {
        match &self.outcome {
            Outcome::Success(payload) => Some(payload),
            Outcome::Failure(_) => None,
        }
    }

    pub fn failure_info(&self) -> Option<&Failure> {
        match &self.outcome {
            Outcome::Success(_) => None,
            Outcome::Failure(failure) => Some(failure),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.failure_info().map(|f| f.error.as_str())
    }

    pub fn headline_latency(&self) -> Option<f64> {
        self.payload().and_then(Payload::headline_latency)
    }
}
