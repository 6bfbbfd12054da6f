use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::Parser;

use crate::config::probe_config::Config;
use crate::probe::Layer;
use crate::session::fault::{MAX_DELAY_MS, MIN_DELAY_MS};
use crate::session::{FaultConfig, SessionRequest};

/// Layered network diagnostics for a single domain: DNS, reachability, traceroute, TCP,
/// TLS, HTTP and HTTP/3
#[derive(Parser, Debug, Clone)]
#[command(name = "netscope")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Domain to diagnose
    pub domain: String,

    /// YAML configuration file (defaults to $CONFIG_FILE, then ./netscope.yml)
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Run only these layers (dns, ip, traceroute, tcp, tls, http, quic)
    #[arg(long = "only", value_delimiter = ',')]
    pub only: Vec<Layer>,

    /// Skip these layers
    #[arg(long = "skip", value_delimiter = ',')]
    pub skip: Vec<Layer>,

    /// Simulate slowness on these layers
    #[arg(long = "slow", value_delimiter = ',')]
    pub slow: Vec<Layer>,

    /// Simulate an outright failure on these layers (the probe is not run)
    #[arg(long = "fail", value_delimiter = ',')]
    pub fail: Vec<Layer>,

    /// Injected latency in milliseconds for --slow layers
    #[arg(long = "delay-ms", value_parser = clap::value_parser!(u64).range(MIN_DELAY_MS..=MAX_DELAY_MS))]
    pub delay_ms: Option<u64>,

    /// Write the JSON report here (defaults to netscope_<domain>.json)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Print the JSON report to stdout instead of writing a file
    #[arg(long = "json")]
    pub json: bool,

    /// Skip the generated explanation
    #[arg(long = "no-explain")]
    pub no_explain: bool,
}

impl Args {
    /// Validate arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.domain.trim().is_empty() {
            return Err("Domain cannot be empty".into());
        }
        if !self.only.is_empty() && !self.skip.is_empty() {
            return Err("Cannot combine --only and --skip".into());
        }
        if self.json && self.output.is_some() {
            return Err("Cannot combine --json and --output".into());
        }
        Ok(())
    }

    /// Enabled layers: `--only` replaces the configured set, `--skip` removes from it.
    pub fn layers(&self, config: &Config) -> BTreeSet<Layer> {
        if !self.only.is_empty() {
            return self.only.iter().copied().collect();
        }
        config
            .layers
            .iter()
            .copied()
            .filter(|layer| !self.skip.contains(layer))
            .collect()
    }

    /// Fault configuration: command-line selections are added to the file's.
    pub fn faults(&self, config: &Config) -> FaultConfig {
        let mut faults = FaultConfig::from(&config.faults);
        faults.slow.extend(self.slow.iter().copied());
        faults.fail.extend(self.fail.iter().copied());
        if let Some(delay_ms) = self.delay_ms {
            faults.delay_ms = delay_ms;
        }
        faults
    }

    pub fn session_request(&self, config: &Config) -> SessionRequest {
        SessionRequest::new(self.domain.trim())
            .with_layers(self.layers(config))
            .with_faults(self.faults(config))
    }
}
