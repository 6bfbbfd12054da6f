use std::time::Duration;

use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::proto::rr::{RData, RecordType};

use super::Layer;
use super::error::ProbeError;
use super::result::{CacheInference, CacheStatus, DnsPayload, Payload, ProbeResult};
use super::timing::timed;

/// TTLs above this many seconds are read as "probably served from a cache".
pub const CACHE_HIT_TTL_THRESHOLD: u32 = 60;

/// Classifies a record TTL. This is a heuristic: a long TTL only suggests the answer came
/// from a cache, it does not inspect any resolver state.
pub fn infer_cache(ttl: u32) -> CacheInference {
    if ttl > CACHE_HIT_TTL_THRESHOLD {
        CacheInference {
            status: CacheStatus::CacheHit,
            reason: "High TTL suggests cached response".to_string(),
            heuristic: true,
        }
    } else {
        CacheInference {
            status: CacheStatus::CacheMiss,
            reason: "Low TTL suggests fresh lookup".to_string(),
            heuristic: true,
        }
    }
}

/// Resolves the IPv4 addresses of `domain`, timing the lookup.
pub async fn resolve(resolver: &TokioAsyncResolver, domain: &str, timeout: Duration) -> ProbeResult {
    ProbeResult::from_outcome(Layer::Dns, measure(resolver, domain, timeout).await)
}

async fn measure(
    resolver: &TokioAsyncResolver,
    domain: &str,
    timeout: Duration,
) -> Result<Payload, ProbeError> {
    let (lookup, latency) = timed(tokio::time::timeout(
        timeout,
        resolver.lookup(domain, RecordType::A),
    ))
    .await;

    let lookup = lookup
        .map_err(|_| ProbeError::Timeout {
            phase: "dns lookup",
            after: timeout,
        })?
        .map_err(|e| ProbeError::resolution(&e))?;

    let mut ips = Vec::new();
    let mut ttl: Option<u32> = None;
    for record in lookup.record_iter() {
        if let Some(RData::A(addr)) = record.data() {
            ips.push(addr.to_string());
            ttl = Some(ttl.map_or(record.ttl(), |t| t.min(record.ttl())));
        }
    }

    let ttl = ttl.ok_or_else(|| ProbeError::Resolution(format!("no A records found for {domain}")))?;
    log::debug!("Resolved {} to {:?} in {:.2}ms (ttl {}s)", domain, ips, latency, ttl);

    Ok(payload(ips, latency, ttl))
}

fn payload(ips: Vec<String>, latency: f64, ttl: u32) -> Payload {
    Payload::Dns(DnsPayload {
        ips,
        latency,
        ttl,
        cache: infer_cache(ttl),
    })
}
