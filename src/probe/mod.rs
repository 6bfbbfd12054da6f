pub mod dns;
pub mod error;
pub mod http;
pub mod process;
pub mod quic;
pub mod reachability;
pub mod result;
pub mod tcp;
pub mod timing;
pub mod tls;
pub mod traceroute;

use std::fmt;
use std::future::Future;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio_native_tls::TlsConnector as TokioTlsConnector;
use trust_dns_resolver::TokioAsyncResolver;

use crate::config::probe_config::ProbeSettings;
use process::{CommandRunner, SystemRunner};
use result::{ProbeResult, ProbeStatus};

/// One stage of a web request. Variant order is the session's execution and reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Layer {
    #[serde(rename = "dns")]
    Dns,
    #[serde(rename = "ip")]
    Reachability,
    #[serde(rename = "traceroute")]
    Traceroute,
    #[serde(rename = "tcp")]
    Tcp,
    #[serde(rename = "tls")]
    Tls,
    #[serde(rename = "http")]
    Http,
    #[serde(rename = "quic")]
    Quic,
}

impl Layer {
    pub const ALL: [Layer; 7] = [
        Layer::Dns,
        Layer::Reachability,
        Layer::Traceroute,
        Layer::Tcp,
        Layer::Tls,
        Layer::Http,
        Layer::Quic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Layer::Dns => "dns",
            Layer::Reachability => "ip",
            Layer::Traceroute => "traceroute",
            Layer::Tcp => "tcp",
            Layer::Tls => "tls",
            Layer::Http => "http",
            Layer::Quic => "quic",
        }
    }

    pub fn success_status(self) -> ProbeStatus {
        match self {
            Layer::Reachability => ProbeStatus::Reachable,
            _ => ProbeStatus::Ok,
        }
    }

    pub fn failure_status(self) -> ProbeStatus {
        match self {
            Layer::Reachability => ProbeStatus::Unreachable,
            _ => ProbeStatus::Error,
        }
    }

    /// Every status this layer may report.
    pub fn statuses(self) -> &'static [ProbeStatus] {
        match self {
            Layer::Reachability => &[ProbeStatus::Reachable, ProbeStatus::Unreachable],
            Layer::Quic => &[ProbeStatus::Ok, ProbeStatus::Error, ProbeStatus::Unsupported],
            _ => &[ProbeStatus::Ok, ProbeStatus::Error],
        }
    }

    /// Whether a successful result of this layer feeds the timing summary.
    pub fn has_headline_latency(self) -> bool {
        matches!(
            self,
            Layer::Dns | Layer::Reachability | Layer::Tcp | Layer::Http
        )
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Layer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let wanted = match wanted.as_str() {
            "reachability" => "ip",
            other => other,
        };
        Layer::ALL
            .into_iter()
            .find(|layer| layer.name() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown layer '{}', expected one of: dns, ip, traceroute, tcp, tls, http, quic",
                    s
                )
            })
    }
}

/// Runs the probe for a layer. Implementations contain every failure in the returned result.
pub trait Prober {
    fn probe(&self, layer: Layer, domain: &str) -> impl Future<Output = ProbeResult> + Send;
}

/// Prober backed by real sockets, the system resolver and external tools.
pub struct NetworkProber<R = SystemRunner> {
    settings: ProbeSettings,
    resolver: TokioAsyncResolver,
    connector: TokioTlsConnector,
    runner: R,
}

impl NetworkProber<SystemRunner> {
    pub fn new(
        settings: ProbeSettings,
        resolver: TokioAsyncResolver,
        connector: TokioTlsConnector,
    ) -> Self {
        Self::with_runner(settings, resolver, connector, SystemRunner)
    }
}

impl<R: CommandRunner> NetworkProber<R> {
    pub fn with_runner(
        settings: ProbeSettings,
        resolver: TokioAsyncResolver,
        connector: TokioTlsConnector,
        runner: R,
    ) -> Self {
        Self {
            settings,
            resolver,
            connector,
            runner,
        }
    }
}

impl<R: CommandRunner> Prober for NetworkProber<R> {
    async fn probe(&self, layer: Layer, domain: &str) -> ProbeResult {
        let s = &self.settings;
        match layer {
            Layer::Dns => dns::resolve(&self.resolver, domain, s.dns_timeout()).await,
            Layer::Reachability => {
                reachability::check(domain, reachability::REACHABILITY_PORT, s.connect_timeout())
                    .await
            }
            Layer::Traceroute => {
                traceroute::trace(
                    &self.runner,
                    &s.traceroute_program,
                    domain,
                    s.traceroute_max_hops,
                    s.traceroute_timeout(),
                )
                .await
            }
            Layer::Tcp => tcp::handshake(domain, s.tcp_port, s.connect_timeout()).await,
            Layer::Tls => tls::inspect(&self.connector, domain, s.tls_port, s.connect_timeout()).await,
            Layer::Http => {
                http::request(
                    &self.connector,
                    domain,
                    &s.http_path,
                    s.http_port,
                    s.http_timeout(),
                )
                .await
            }
            Layer::Quic => quic::request(&self.runner, &s.curl_program, domain, s.quic_timeout()).await,
        }
    }
}
