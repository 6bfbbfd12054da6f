use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use super::Layer;
use super::error::ProbeError;
use super::process::CommandRunner;
use super::result::{HopRecord, Payload, ProbeResult, TraceroutePayload};

pub const DEFAULT_MAX_HOPS: u8 = 15;

/// `<hop> <host> (<ip>) <latency> ms`, the first-probe column of BSD/Linux traceroute.
static HOP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(\d+)\s+(.+?)\s+\(([\d.]+)\)\s+([\d.]+)\s+ms").expect("hop pattern is valid")
});

/// Parses one traceroute output line. Timeouts (`* * *`) and other shapes yield `None`.
pub fn parse_hop(line: &str) -> Option<HopRecord> {
    let caps = HOP_LINE.captures(line)?;
    Some(HopRecord {
        hop: caps[1].parse().ok()?,
        host: caps[2].to_string(),
        ip: caps[3].to_string(),
        latency: caps[4].parse().ok()?,
    })
}

/// Parses the full tool output. Unmatched lines are skipped, so hop numbers may have gaps.
pub fn parse_hops(output: &str) -> Vec<HopRecord> {
    output.lines().filter_map(parse_hop).collect()
}

/// Traces the path to `domain` with the external tracer.
pub async fn trace<R: CommandRunner>(
    runner: &R,
    program: &str,
    domain: &str,
    max_hops: u8,
    timeout: Duration,
) -> ProbeResult {
    ProbeResult::from_outcome(
        Layer::Traceroute,
        run(runner, program, domain, max_hops, timeout).await,
    )
}

async fn run<R: CommandRunner>(
    runner: &R,
    program: &str,
    domain: &str,
    max_hops: u8,
    timeout: Duration,
) -> Result<Payload, ProbeError> {
    let args = vec!["-m".to_string(), max_hops.to_string(), domain.to_string()];
    let output = runner.run(program, &args, None, timeout).await?;

    if !output.success {
        let stderr = output.stderr.trim();
        return Err(ProbeError::Subprocess(if stderr.is_empty() {
            format!("{program} exited with status {:?}", output.code)
        } else {
            stderr.to_string()
        }));
    }

    let hops = parse_hops(&output.stdout);
    log::debug!("Parsed {} hops from {} output", hops.len(), program);
    Ok(Payload::Traceroute(TraceroutePayload { hops }))
}
