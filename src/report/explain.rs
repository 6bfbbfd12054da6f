use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::probe_config::ExplainerSettings;
use crate::probe::Layer;
use crate::probe::error::ProbeError;
use crate::probe::process::CommandRunner;
use crate::probe::result::{CacheStatus, Payload};
use crate::session::LayerResults;

/// TCP connect time above which the handshake is called out.
pub const SLOW_TCP_MS: f64 = 150.0;
/// HTTP total above which the application layer is called out.
pub const SLOW_HTTP_MS: f64 = 300.0;

const NO_ISSUES: &str = "No major issues detected.";

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExplanationStatus {
    Ok,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Explanation {
    pub status: ExplanationStatus,
    pub text: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Prompt handed to the text-generation service.
pub fn build_prompt(results: &LayerResults) -> String {
    let diagnostics = serde_json::to_string_pretty(results).unwrap_or_else(|_| "{}".to_string());
    format!(
        "You are a senior distributed systems engineer.\n\n\
         Explain the following diagnostics:\n\
         1. What was slow or failed\n\
         2. Why it happened\n\
         3. What to check next\n\n\
         Diagnostics:\n{diagnostics}\n\n\
         Be concise and technical.\n"
    )
}

/// Deterministic summary used whenever the generation service is unavailable.
pub fn fallback_explanation(results: &LayerResults) -> String {
    let mut notes = Vec::new();

    for (layer, result) in results {
        match (layer, result.payload()) {
            (Layer::Dns, Some(Payload::Dns(dns))) if dns.cache.status == CacheStatus::CacheMiss => {
                notes.push("DNS was slow due to a cache miss (recursive lookup).".to_string());
            }
            (Layer::Tcp, Some(Payload::Tcp(tcp))) if tcp.connect_time_ms > SLOW_TCP_MS => {
                notes.push("TCP handshake latency suggests network delay.".to_string());
            }
            (Layer::Tls, Some(Payload::Tls(cert))) if cert.expired => {
                notes.push(format!(
                    "TLS certificate expired on {}; clients will reject the connection.",
                    cert.not_after
                ));
            }
            (Layer::Http, Some(Payload::Http(http))) if http.timings.total > SLOW_HTTP_MS => {
                notes.push("HTTP dominated total latency (backend slowness).".to_string());
            }
            (_, None) if result.simulated.is_some() => {
                notes.push(format!("{layer} failure was simulated."));
            }
            (Layer::Traceroute, None) => {
                notes.push("Traceroute was blocked or incomplete (common in restricted networks).".to_string());
            }
            (_, None) => {
                if let Some(err) = result.error() {
                    notes.push(format!("{layer} layer failed: {err}"));
                }
            }
            _ => {}
        }
    }

    if notes.is_empty() {
        NO_ISSUES.to_string()
    } else {
        notes
            .iter()
            .map(|n| format!("- {n}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Asks the configured generation service to explain `results`, degrading to the local
/// rule-based summary on any failure.
pub async fn explain<R: CommandRunner>(
    runner: &R,
    settings: &ExplainerSettings,
    results: &LayerResults,
) -> Explanation {
    let prompt = build_prompt(results);

    let generated = match &settings.endpoint {
        Some(endpoint) => generate_http(endpoint, &settings.model, &prompt, settings.timeout()).await,
        None => generate_command(runner, &settings.command, &prompt, settings.timeout()).await,
    };

    match generated {
        Ok(text) if !text.trim().is_empty() => Explanation {
            status: ExplanationStatus::Ok,
            text: text.trim().to_string(),
        },
        Ok(_) => {
            log::warn!("Explanation service returned no text, using local summary");
            fallback(results)
        }
        Err(e) => {
            log::warn!("Explanation service unavailable ({}), using local summary", e);
            fallback(results)
        }
    }
}

fn fallback(results: &LayerResults) -> Explanation {
    Explanation {
        status: ExplanationStatus::Fallback,
        text: fallback_explanation(results),
    }
}

async fn generate_command<R: CommandRunner>(
    runner: &R,
    command: &[String],
    prompt: &str,
    timeout: Duration,
) -> Result<String, BoxError> {
    let (program, args) = command
        .split_first()
        .ok_or_else(|| ProbeError::Unsupported("no explainer command configured".to_string()))?;

    let output = runner.run(program, args, Some(prompt.as_bytes()), timeout).await?;
    if !output.success {
        return Err(ProbeError::Subprocess(output.stderr.trim().to_string()).into());
    }
    Ok(output.stdout)
}

/// Posts the prompt to an Ollama-compatible `/api/generate` endpoint.
async fn generate_http(
    endpoint: &str,
    model: &str,
    prompt: &str,
    timeout: Duration,
) -> Result<String, BoxError> {
    let url = Url::parse(endpoint)?.join("api/generate")?;

    let client = Client::builder().timeout(timeout).build()?;
    let response = client
        .post(url)
        .json(&GenerateRequest {
            model,
            prompt,
            stream: false,
        })
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(format!("generation request failed: {status} - {body}").into());
    }

    Ok(response.json::<GenerateResponse>().await?.response)
}
