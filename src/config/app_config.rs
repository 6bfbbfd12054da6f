use std::env;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use trust_dns_resolver::{
    TokioAsyncResolver,
    config::{NameServerConfig, NameServerConfigGroup, Protocol, ResolverConfig, ResolverOpts},
};

use super::probe_config::Config;
use crate::session::fault::{MAX_DELAY_MS, MIN_DELAY_MS};

const DEFAULT_CONFIG_FILE: &str = "netscope.yml";

#[derive(Debug)]
pub struct AppConfig {
    pub config: Config,
    pub config_file: Option<PathBuf>,
    pub dns_hosts: Vec<String>,
}

/// Load the application configuration from a YAML file and environment variables.
/// The file is taken from `explicit`, then the `CONFIG_FILE` environment variable, then
/// `netscope.yml` in the working directory. Only a missing default file is tolerated.
/// `DNS_HOSTS` and `NETSCOPE_EXPLAIN_ENDPOINT` override the file.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let named = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var("CONFIG_FILE").ok().map(PathBuf::from));

    let (mut config, config_file) = match named {
        Some(path) => (read_config(&path)?, Some(path)),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            let path = PathBuf::from(DEFAULT_CONFIG_FILE);
            (read_config(&path)?, Some(path))
        }
        None => {
            log::debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
            (Config::default(), None)
        }
    };

    let dns_hosts = env::var("DNS_HOSTS")
        .map(|hosts| parse_dns_hosts(&hosts))
        .unwrap_or_default();
    if !dns_hosts.is_empty() {
        log::info!("Using DNS hosts: {:?}", dns_hosts);
    }

    if let Ok(endpoint) = env::var("NETSCOPE_EXPLAIN_ENDPOINT") {
        if !endpoint.trim().is_empty() {
            config.explainer.endpoint = Some(endpoint.trim().to_string());
        }
    }

    Ok(AppConfig {
        config,
        config_file,
        dns_hosts,
    })
}

fn read_config(path: &Path) -> Result<Config> {
    let config_str = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: Config = serde_yaml::from_str(&config_str)
        .with_context(|| format!("Invalid YAML in {}", path.display()))?;
    validate(&config).with_context(|| format!("Invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Rejects values the command line would refuse and timeouts that would fail every probe.
pub fn validate(config: &Config) -> Result<()> {
    let delay_ms = config.faults.delay_ms;
    if !(MIN_DELAY_MS..=MAX_DELAY_MS).contains(&delay_ms) {
        bail!("faults.delay_ms must be between {MIN_DELAY_MS} and {MAX_DELAY_MS}, got {delay_ms}");
    }

    let probes = &config.probes;
    let timeouts = [
        ("probes.connect_timeout_secs", probes.connect_timeout_secs),
        ("probes.dns_timeout_secs", probes.dns_timeout_secs),
        ("probes.http_timeout_secs", probes.http_timeout_secs),
        ("probes.traceroute_timeout_secs", probes.traceroute_timeout_secs),
        ("probes.quic_timeout_secs", probes.quic_timeout_secs),
        ("explainer.timeout_secs", config.explainer.timeout_secs),
    ];
    for (name, secs) in timeouts {
        if !secs.is_finite() || secs <= 0.0 {
            bail!("{name} must be a positive number of seconds, got {secs}");
        }
    }
    Ok(())
}

pub fn parse_dns_hosts(hosts: &str) -> Vec<String> {
    hosts
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Setup a TLS connector that validates peers against the system trust store.
/// Validation failures surface as TLS/HTTP probe failures.
pub fn setup_tls_connector() -> Result<TokioTlsConnector, native_tls::Error> {
    let connector = native_tls::TlsConnector::builder().build()?;
    Ok(TokioTlsConnector::from(connector))
}

/// Setup the DNS resolver used by the DNS probe.
/// With no `dns_hosts` the system resolver configuration is used. Otherwise the given
/// name servers are queried over TCP. The resolver cache is left at its default so that
/// TTLs reflect what the upstream returned.
pub fn setup_resolver(dns_hosts: &[String]) -> Result<TokioAsyncResolver> {
    if dns_hosts.is_empty() {
        return TokioAsyncResolver::tokio_from_system_conf()
            .context("Failed to read system resolver configuration");
    }

    let mut name_servers = NameServerConfigGroup::new();

    for host in dns_hosts {
        let ip: IpAddr = host
            .parse()
            .with_context(|| format!("Invalid DNS host: {host}"))?;
        name_servers.push(NameServerConfig {
            socket_addr: (ip, 53).into(),
            protocol: Protocol::Tcp,
            tls_dns_name: None,
            trust_negative_responses: false,
            bind_addr: None,
        });
    }

    let mut opts = ResolverOpts::default();
    opts.attempts = 1;

    let resolver_config = ResolverConfig::from_parts(None, vec![], name_servers);
    Ok(TokioAsyncResolver::tokio(resolver_config, opts))
}
