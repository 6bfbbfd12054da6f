use std::collections::BTreeSet;
use std::time::Duration;

use serde::Deserialize;

use crate::probe::Layer;
use crate::probe::http::{DEFAULT_HTTP_PATH, DEFAULT_HTTP_PORT};
use crate::probe::quic::DEFAULT_QUIC_TIMEOUT;
use crate::probe::tcp::DEFAULT_TCP_PORT;
use crate::probe::tls::DEFAULT_TLS_PORT;
use crate::probe::traceroute::DEFAULT_MAX_HOPS;

/// Configuration file for a NetScope session.
/// Every section is optional; missing values fall back to the defaults below.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Layers to run. Defaults to all of them.
    pub layers: BTreeSet<Layer>,

    /// Ports, timeouts and external tools used by the probes.
    pub probes: ProbeSettings,

    /// Simulated degradation applied on top of the real measurements.
    pub faults: FaultSettings,

    /// The external explanation service.
    pub explainer: ExplainerSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layers: Layer::ALL.into_iter().collect(),
            probes: ProbeSettings::default(),
            faults: FaultSettings::default(),
            explainer: ExplainerSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// Connect timeout for the reachability, TCP and TLS probes.
    pub connect_timeout_secs: f64,
    pub dns_timeout_secs: f64,
    pub tcp_port: u16,
    pub tls_port: u16,
    pub http_port: u16,
    pub http_path: String,
    pub http_timeout_secs: f64,
    pub traceroute_program: String,
    pub traceroute_max_hops: u8,
    pub traceroute_timeout_secs: f64,
    /// HTTP client used for the HTTP/3 probe. Must understand `-V` and `--http3-only`.
    pub curl_program: String,
    pub quic_timeout_secs: f64,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 3.0,
            dns_timeout_secs: 5.0,
            tcp_port: DEFAULT_TCP_PORT,
            tls_port: DEFAULT_TLS_PORT,
            http_port: DEFAULT_HTTP_PORT,
            http_path: DEFAULT_HTTP_PATH.to_string(),
            http_timeout_secs: 10.0,
            traceroute_program: "traceroute".to_string(),
            traceroute_max_hops: DEFAULT_MAX_HOPS,
            traceroute_timeout_secs: 30.0,
            curl_program: "curl".to_string(),
            quic_timeout_secs: DEFAULT_QUIC_TIMEOUT.as_secs_f64(),
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

impl ProbeSettings {
    pub fn connect_timeout(&self) -> Duration {
        secs(self.connect_timeout_secs)
    }

    pub fn dns_timeout(&self) -> Duration {
        secs(self.dns_timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        secs(self.http_timeout_secs)
    }

    pub fn traceroute_timeout(&self) -> Duration {
        secs(self.traceroute_timeout_secs)
    }

    pub fn quic_timeout(&self) -> Duration {
        secs(self.quic_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FaultSettings {
    /// Layers whose headline latency is inflated by `delay_ms`.
    pub slow: BTreeSet<Layer>,
    /// Layers replaced by a simulated failure without being probed.
    pub fail: BTreeSet<Layer>,
    pub delay_ms: u64,
}

impl Default for FaultSettings {
    fn default() -> Self {
        Self {
            slow: BTreeSet::new(),
            fail: BTreeSet::new(),
            delay_ms: default_delay_ms(),
        }
    }
}

fn default_delay_ms() -> u64 {
    800
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExplainerSettings {
    pub enabled: bool,
    /// Local command fed the prompt on stdin, e.g. `ollama run llama3`.
    pub command: Vec<String>,
    /// Base URL of an Ollama-compatible HTTP API. Takes precedence over `command`.
    pub endpoint: Option<String>,
    pub model: String,
    pub timeout_secs: f64,
}

impl Default for ExplainerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            command: vec!["ollama".to_string(), "run".to_string(), "llama3".to_string()],
            endpoint: None,
            model: "llama3".to_string(),
            timeout_secs: 30.0,
        }
    }
}

impl ExplainerSettings {
    pub fn timeout(&self) -> Duration {
        secs(self.timeout_secs)
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn test_default_delay_ms() {
        assert_eq!(default_delay_ms(), 800);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = serde_yaml::from_str("{}").expect("Invalid YAML");
        assert_eq!(config.layers.len(), Layer::ALL.len());
        assert_eq!(config.probes.tcp_port, 80);
        assert_eq!(config.probes.tls_port, 443);
        assert_eq!(config.probes.http_path, "/");
        assert_eq!(config.probes.traceroute_max_hops, 15);
        assert_eq!(config.probes.connect_timeout(), Duration::from_secs(3));
        assert_eq!(config.probes.quic_timeout(), Duration::from_secs(10));
        assert!(config.faults.slow.is_empty());
        assert_eq!(config.faults.delay_ms, 800);
        assert!(config.explainer.enabled);
        assert_eq!(config.explainer.command, vec!["ollama", "run", "llama3"]);
    }

    #[test]
    fn test_config_deserialization() {
        let yaml = r#"
                    layers: [dns, ip, http]
                    probes:
                        tcp_port: 8080
                        http_path: /status
                        connect_timeout_secs: 1.5
                        curl_program: /opt/curl/bin/curl
                    faults:
                        slow: [dns, tcp]
                        fail: [http]
                        delay_ms: 1200
                    explainer:
                        enabled: false
                        endpoint: http://localhost:11434
                                    "#;

        let config: Config = serde_yaml::from_str(yaml).expect("Invalid YAML");
        assert_eq!(
            config.layers.into_iter().collect::<Vec<_>>(),
            vec![Layer::Dns, Layer::Reachability, Layer::Http]
        );
        assert_eq!(config.probes.tcp_port, 8080);
        assert_eq!(config.probes.http_path, "/status");
        assert_eq!(config.probes.connect_timeout(), Duration::from_millis(1500));
        assert_eq!(config.probes.curl_program, "/opt/curl/bin/curl");
        // untouched fields keep their defaults
        assert_eq!(config.probes.tls_port, 443);
        assert!(config.faults.slow.contains(&Layer::Dns));
        assert!(config.faults.slow.contains(&Layer::Tcp));
        assert!(config.faults.fail.contains(&Layer::Http));
        assert_eq!(config.faults.delay_ms, 1200);
        assert!(!config.explainer.enabled);
        assert_eq!(
            config.explainer.endpoint.as_deref(),
            Some("http://localhost:11434")
        );
    }

    #[test]
    fn test_unknown_layer_is_rejected() {
        let result: Result<Config, _> = serde_yaml::from_str("layers: [smtp]");
        assert!(result.is_err());
    }

    #[test]
    fn test_example_file_matches_defaults() {
        let yaml = include_str!("../../netscope.example.yml");
        let config: Config = serde_yaml::from_str(yaml).expect("Invalid YAML");
        let defaults = Config::default();
        assert_eq!(config.layers, defaults.layers);
        assert_eq!(config.probes.traceroute_timeout(), defaults.probes.traceroute_timeout());
        assert_eq!(config.faults.delay_ms, defaults.faults.delay_ms);
        assert_eq!(config.explainer.command, defaults.explainer.command);
        assert_eq!(config.explainer.endpoint, None);
    }

    #[test]
    fn test_negative_timeout_is_zero() {
        assert_eq!(secs(-1.0), Duration::ZERO);
    }
}
