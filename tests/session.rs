use std::collections::BTreeMap;
use std::sync::Mutex;

use netscope::probe::error::ProbeError;
use netscope::probe::result::{
    CertificateInfo, DnsPayload, HttpPayload, HttpTimings, Payload, ProbeResult, ProbeStatus,
    QuicPayload, ReachabilityPayload, Simulation, TcpPayload, TraceroutePayload,
};
use netscope::probe::dns::infer_cache;
use netscope::probe::{Layer, Prober};
use netscope::report::build_report;
use netscope::session::{FaultConfig, Progress, SessionRequest, run_session};

/// Prober returning canned results and recording which layers were asked for.
#[derive(Default)]
struct ScriptedProber {
    overrides: BTreeMap<Layer, ProbeResult>,
    calls: Mutex<Vec<Layer>>,
}

impl ScriptedProber {
    fn failing(mut self, layer: Layer, err: ProbeError) -> Self {
        self.overrides.insert(layer, ProbeResult::failure(layer, &err));
        self
    }

    fn calls(&self) -> Vec<Layer> {
        self.calls.lock().unwrap().clone()
    }
}

fn healthy(layer: Layer) -> ProbeResult {
    let payload = match layer {
        Layer::Dns => Payload::Dns(DnsPayload {
            ips: vec!["93.184.216.34".into()],
            latency: 12.0,
            ttl: 300,
            cache: infer_cache(300),
        }),
        Layer::Reachability => Payload::Reachability(ReachabilityPayload {
            latency_ms: 20.5,
            method: "tcp_connect".into(),
            port: 443,
        }),
        Layer::Traceroute => Payload::Traceroute(TraceroutePayload { hops: vec![] }),
        Layer::Tcp => Payload::Tcp(TcpPayload {
            connect_time_ms: 18.0,
            port: 80,
        }),
        Layer::Tls => Payload::Tls(CertificateInfo {
            subject: "example.com".into(),
            issuer: "Example CA".into(),
            not_before: "2024-01-01".into(),
            not_after: "2099-01-01".into(),
            expired: false,
        }),
        Layer::Http => Payload::Http(HttpPayload {
            ip: "93.184.216.34".into(),
            status_line: "HTTP/1.1 200 OK".into(),
            timings: HttpTimings {
                dns: 1.0,
                tcp: 2.0,
                tls: 3.0,
                request: 0.5,
                response: 40.0,
                total: 46.5,
            },
        }),
        Layer::Quic => Payload::Quic(QuicPayload {
            http_code: "200".into(),
            total_time_ms: 55.0,
        }),
    };
    ProbeResult::success(layer, payload)
}

impl Prober for ScriptedProber {
    async fn probe(&self, layer: Layer, _domain: &str) -> ProbeResult {
        self.calls.lock().unwrap().push(layer);
        self.overrides
            .get(&layer)
            .cloned()
            .unwrap_or_else(|| healthy(layer))
    }
}

#[tokio::test]
async fn test_disabled_layers_are_absent() {
    let prober = ScriptedProber::default();
    let request = SessionRequest::new("example.com").with_layers([Layer::Dns, Layer::Http]);

    let outcome = run_session(&prober, &request, |_, _| {}).await;

    assert_eq!(prober.calls(), vec![Layer::Dns, Layer::Http]);
    assert_eq!(
        outcome.results.keys().copied().collect::<Vec<_>>(),
        vec![Layer::Dns, Layer::Http]
    );
    assert_eq!(outcome.summary.get(Layer::Tcp), None);
}

#[tokio::test]
async fn test_layers_run_in_fixed_order() {
    let prober = ScriptedProber::default();
    let request = SessionRequest::new("example.com")
        .with_layers([Layer::Quic, Layer::Tcp, Layer::Dns, Layer::Tls]);

    let mut seen = Vec::new();
    run_session(&prober, &request, |progress, _| seen.push(progress.layer)).await;

    let expected = vec![Layer::Dns, Layer::Tcp, Layer::Tls, Layer::Quic];
    assert_eq!(prober.calls(), expected);
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_summary_total_is_sum_of_headline_latencies() {
    let prober = ScriptedProber::default();
    let request = SessionRequest::new("example.com");

    let outcome = run_session(&prober, &request, |_, _| {}).await;

    let layers: Vec<Layer> = outcome.summary.entries().iter().map(|(l, _)| *l).collect();
    assert_eq!(
        layers,
        vec![Layer::Dns, Layer::Reachability, Layer::Tcp, Layer::Http]
    );
    assert_eq!(outcome.summary.total(), 12.0 + 20.5 + 18.0 + 46.5);
}

#[tokio::test]
async fn test_simulated_failure_skips_probe() {
    let prober = ScriptedProber::default();
    let faults = FaultConfig {
        fail: [Layer::Http].into_iter().collect(),
        ..FaultConfig::none()
    };
    let request = SessionRequest::new("example.com")
        .with_layers([Layer::Tcp, Layer::Http])
        .with_faults(faults);

    let outcome = run_session(&prober, &request, |_, _| {}).await;

    assert_eq!(prober.calls(), vec![Layer::Tcp]);
    let http = &outcome.results[&Layer::Http];
    assert_eq!(http.status, ProbeStatus::Error);
    assert_eq!(http.error(), Some("Simulated failure injected"));
    assert_eq!(http.simulated, Some(Simulation::Failure));
    assert_eq!(outcome.summary.get(Layer::Http), None);
}

#[tokio::test]
async fn test_slow_layer_gets_delay_and_others_unchanged() {
    let prober = ScriptedProber::default();
    let faults = FaultConfig {
        slow: [Layer::Tcp].into_iter().collect(),
        delay_ms: 800,
        ..FaultConfig::none()
    };
    let request = SessionRequest::new("example.com")
        .with_layers([Layer::Dns, Layer::Tcp])
        .with_faults(faults);

    let outcome = run_session(&prober, &request, |_, _| {}).await;

    let tcp = &outcome.results[&Layer::Tcp];
    assert_eq!(tcp.headline_latency(), Some(818.0));
    assert_eq!(tcp.simulated, Some(Simulation::Latency { delay_ms: 800 }));
    assert_eq!(outcome.results[&Layer::Dns], healthy(Layer::Dns));
    assert_eq!(outcome.summary.total(), 12.0 + 818.0);
}

#[tokio::test]
async fn test_progress_is_monotonic() {
    let prober = ScriptedProber::default();
    let request = SessionRequest::new("example.com");

    let mut progress: Vec<Progress> = Vec::new();
    run_session(&prober, &request, |p, _| progress.push(*p)).await;

    assert_eq!(progress.len(), 7);
    for (i, p) in progress.iter().enumerate() {
        assert_eq!(p.completed, i + 1);
        assert_eq!(p.total, 7);
    }
}

#[tokio::test]
async fn test_failure_does_not_stop_session() {
    let prober = ScriptedProber::default()
        .failing(Layer::Dns, ProbeError::Resolution("NXDOMAIN".into()))
        .failing(Layer::Traceroute, ProbeError::Subprocess("not permitted".into()))
        .failing(Layer::Quic, ProbeError::Unsupported("curl built without HTTP/3 support".into()));
    let request = SessionRequest::new("example.com");

    let outcome = run_session(&prober, &request, |_, _| {}).await;

    assert_eq!(outcome.results.len(), 7);
    assert_eq!(outcome.results[&Layer::Dns].status, ProbeStatus::Error);
    assert_eq!(outcome.results[&Layer::Quic].status, ProbeStatus::Unsupported);
    assert!(outcome.results[&Layer::Http].is_success());
    assert_eq!(outcome.summary.get(Layer::Dns), None);
}

#[tokio::test]
async fn test_every_result_is_well_formed() {
    let prober = ScriptedProber::default()
        .failing(Layer::Reachability, ProbeError::Connect("refused".into()))
        .failing(Layer::Tls, ProbeError::Handshake("bad certificate".into()));
    let faults = FaultConfig {
        fail: [Layer::Tcp].into_iter().collect(),
        ..FaultConfig::none()
    };
    let request = SessionRequest::new("example.com").with_faults(faults);

    let outcome = run_session(&prober, &request, |_, _| {}).await;

    for (layer, result) in &outcome.results {
        assert!(layer.statuses().contains(&result.status), "{layer}: {:?}", result.status);
        assert_ne!(result.payload().is_some(), result.error().is_some(), "{layer}");
    }
    assert_eq!(
        outcome.results[&Layer::Reachability].status,
        ProbeStatus::Unreachable
    );
}

#[tokio::test]
async fn test_report_wraps_results() {
    let prober = ScriptedProber::default();
    let request = SessionRequest::new("example.com").with_layers([Layer::Tcp]);

    let outcome = run_session(&prober, &request, |_, _| {}).await;
    let value = serde_json::to_value(build_report("example.com", outcome.results)).unwrap();

    let object = value.as_object().unwrap();
    assert_eq!(object.keys().collect::<Vec<_>>(), vec!["meta", "results"]);
    assert_eq!(value["results"]["tcp"]["status"], "ok");
    assert_eq!(value["results"]["tcp"]["connect_time_ms"], 18.0);
}
