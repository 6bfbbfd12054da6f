use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::session::LayerResults;

pub const TOOL_NAME: &str = "NetScope";

/// The exported artifact of one session.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticReport {
    pub meta: ReportMeta,
    pub results: LayerResults,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub tool: String,
    pub domain: String,
    pub timestamp: String,
}

/// ISO-8601 UTC timestamp with a trailing `Z`.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

/// Wraps the session results with metadata stamped now.
pub fn build_report(domain: &str, results: LayerResults) -> DiagnosticReport {
    build_report_at(domain, results, Utc::now())
}

pub fn build_report_at(domain: &str, results: LayerResults, at: DateTime<Utc>) -> DiagnosticReport {
    DiagnosticReport {
        meta: ReportMeta {
            tool: TOOL_NAME.to_string(),
            domain: domain.to_string(),
            timestamp: format_timestamp(at),
        },
        results,
    }
}

/// Download name for a report, keyed by domain.
pub fn report_filename(domain: &str) -> String {
    let safe: String = domain
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("netscope_{safe}.json")
}

impl DiagnosticReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn write_json<W: Write>(&self, mut writer: W) -> std::io::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writeln!(writer)
    }
}
