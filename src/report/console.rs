use std::io::{self, Write};

use unicode_truncate::UnicodeTruncateStr;

use super::builder::DiagnosticReport;
use super::explain::Explanation;
use crate::probe::Layer;
use crate::probe::result::{Payload, ProbeResult, ProbeStatus};
use crate::session::{Progress, SessionOutcome};

const LAYER_WIDTH: usize = 10;

fn to_fixed_width(input: &str, width: usize) -> String {
    let (truncated, _) = input.unicode_truncate(width);
    format!("{:<width$}", truncated, width = width)
}

/// Short human-readable detail for a successful layer.
fn describe(payload: &Payload) -> String {
    match payload {
        Payload::Dns(p) => format!(
            "{} in {:.1}ms, ttl {}s, {:?} (heuristic: {})",
            p.ips.join(", "),
            p.latency,
            p.ttl,
            p.cache.status,
            p.cache.reason
        ),
        Payload::Reachability(p) => {
            format!("{} port {} in {:.2}ms", p.method, p.port, p.latency_ms)
        }
        Payload::Traceroute(p) => match p.hops.last() {
            Some(last) => format!(
                "{} hop(s), last {} ({}) {:.1}ms",
                p.hops.len(),
                last.host,
                last.ip,
                last.latency
            ),
            None => "no hops resolved".to_string(),
        },
        Payload::Tcp(p) => format!("port {} connected in {:.1}ms", p.port, p.connect_time_ms),
        Payload::Tls(p) => format!(
            "{} issued by {}, valid {} to {}{}",
            p.subject,
            p.issuer,
            p.not_before,
            p.not_after,
            if p.expired { " (EXPIRED)" } else { "" }
        ),
        Payload::Http(p) => format!(
            "{} from {} in {:.1}ms (dns {:.1} / tcp {:.1} / tls {:.1} / req {:.1} / resp {:.1})",
            p.status_line,
            p.ip,
            p.timings.total,
            p.timings.dns,
            p.timings.tcp,
            p.timings.tls,
            p.timings.request,
            p.timings.response
        ),
        Payload::Quic(p) => format!("HTTP/3 {} in {:.1}ms", p.http_code, p.total_time_ms),
    }
}

fn marker_and_detail(layer: Layer, result: &ProbeResult) -> (&'static str, String) {
    if let Some(payload) = result.payload() {
        let mut detail = describe(payload);
        if result.simulated.is_some() {
            detail.push_str(" [simulated latency]");
            return ("🧪", detail);
        }
        return ("✅", detail);
    }

    let err = result.error().unwrap_or("unknown error");
    if result.simulated.is_some() {
        ("🧪", format!("{err} [simulated]"))
    } else if layer == Layer::Traceroute {
        (
            "⚠️",
            format!("blocked or incomplete (expected in restricted networks): {err}"),
        )
    } else if result.status == ProbeStatus::Unsupported {
        ("⚠️", format!("unsupported: {err}"))
    } else {
        ("❌", err.to_string())
    }
}

/// Human-readable session output. With `json` set, everything meant for a person goes to
/// `err` and `out` carries only the JSON report.
pub struct Console<O: Write, E: Write> {
    out: O,
    err: E,
    json: bool,
}

impl<O: Write, E: Write> Console<O, E> {
    pub fn new(out: O, err: E, json: bool) -> Self {
        Self { out, err, json }
    }

    fn human(&mut self) -> &mut dyn Write {
        if self.json { &mut self.err } else { &mut self.out }
    }

    pub fn layer(&mut self, progress: &Progress, result: &ProbeResult) -> io::Result<()> {
        let (marker, detail) = marker_and_detail(progress.layer, result);
        let layer = to_fixed_width(progress.layer.name(), LAYER_WIDTH);
        writeln!(
            self.human(),
            "[{}/{}] {marker} {layer} {detail}",
            progress.completed,
            progress.total
        )
    }

    pub fn summary(&mut self, outcome: &SessionOutcome) -> io::Result<()> {
        if outcome.summary.is_empty() {
            return Ok(());
        }
        let w = self.human();
        writeln!(w)?;
        writeln!(w, "Request time breakdown:")?;
        for (layer, ms) in outcome.summary.entries() {
            writeln!(w, "  {} {:>10.1}ms", to_fixed_width(layer.name(), LAYER_WIDTH), ms)?;
        }
        writeln!(
            w,
            "  {} {:>10.0}ms",
            to_fixed_width("total", LAYER_WIDTH),
            outcome.summary.total()
        )?;

        // Illustrative only: two different clients, two different connections.
        let http = outcome.results.get(&Layer::Http).and_then(|r| match r.payload() {
            Some(Payload::Http(p)) => Some(p.timings.total),
            _ => None,
        });
        let quic = outcome.results.get(&Layer::Quic).and_then(|r| match r.payload() {
            Some(Payload::Quic(p)) => Some(p.total_time_ms),
            _ => None,
        });
        if let (Some(http), Some(quic)) = (http, quic) {
            writeln!(
                w,
                "  HTTP/1.1 over TCP {:.1}ms vs HTTP/3 over QUIC {:.1}ms",
                http, quic
            )?;
        }
        Ok(())
    }

    pub fn explanation(&mut self, explanation: &Explanation) -> io::Result<()> {
        let w = self.human();
        writeln!(w)?;
        writeln!(w, "Explanation ({:?}):", explanation.status)?;
        writeln!(w, "{}", explanation.text)
    }

    /// Prints the report as JSON on `out`.
    pub fn report(&mut self, report: &DiagnosticReport) -> io::Result<()> {
        report.write_json(&mut self.out)
    }

    /// Notes where the report file went.
    pub fn saved(&mut self, path: &std::path::Path) -> io::Result<()> {
        let w = self.human();
        writeln!(w)?;
        writeln!(w, "Report written to {}", path.display())
    }

    pub fn into_inner(self) -> (O, E) {
        (self.out, self.err)
    }
}
