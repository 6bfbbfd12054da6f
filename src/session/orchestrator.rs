use std::collections::{BTreeMap, BTreeSet};

use super::fault::FaultConfig;
use crate::probe::result::ProbeResult;
use crate::probe::{Layer, Prober};

/// Results keyed by layer. The map order is the fixed layer order.
pub type LayerResults = BTreeMap<Layer, ProbeResult>;

/// What a caller asks for: one domain, a set of enabled layers and the simulated faults.
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub domain: String,
    pub layers: BTreeSet<Layer>,
    pub faults: FaultConfig,
}

impl SessionRequest {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            layers: Layer::ALL.into_iter().collect(),
            faults: FaultConfig::none(),
        }
    }

    pub fn with_layers(mut self, layers: impl IntoIterator<Item = Layer>) -> Self {
        self.layers = layers.into_iter().collect();
        self
    }

    pub fn with_faults(mut self, faults: FaultConfig) -> Self {
        self.faults = faults;
        self
    }
}

/// Headline latency per layer, in the order the layers completed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimingSummary {
    entries: Vec<(Layer, f64)>,
}

impl TimingSummary {
    pub fn record(&mut self, layer: Layer, latency_ms: f64) {
        self.entries.push((layer, latency_ms));
    }

    pub fn entries(&self) -> &[(Layer, f64)] {
        &self.entries
    }

    pub fn get(&self, layer: Layer) -> Option<f64> {
        self.entries
            .iter()
            .find(|(l, _)| *l == layer)
            .map(|(_, ms)| *ms)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.entries.iter().map(|(_, ms)| ms).sum()
    }
}

/// Coarse "N of M layers complete" progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub layer: Layer,
}

#[derive(Debug, Clone, Default)]
pub struct SessionOutcome {
    pub results: LayerResults,
    pub summary: TimingSummary,
}

/// Runs every enabled layer in order, one at a time. A failing layer is recorded and the
/// session moves on; nothing here aborts the run.
pub async fn run_session<P, F>(prober: &P, request: &SessionRequest, mut on_layer: F) -> SessionOutcome
where
    P: Prober,
    F: FnMut(&Progress, &ProbeResult),
{
    let total = request.layers.len();
    let mut outcome = SessionOutcome::default();

    log::info!(
        "Starting session for {} with {} layer(s)",
        request.domain,
        total
    );

    for (index, layer) in Layer::ALL
        .into_iter()
        .filter(|layer| request.layers.contains(layer))
        .enumerate()
    {
        let result = if request.faults.fails(layer) {
            log::info!("{}: simulated failure, probe not run", layer);
            request.faults.simulated_failure(layer)
        } else {
            let real = prober.probe(layer, &request.domain).await;
            request.faults.apply(layer, real)
        };

        log_result(layer, &result);

        if let Some(latency) = result.headline_latency() {
            outcome.summary.record(layer, latency);
        }

        let progress = Progress {
            completed: index + 1,
            total,
            layer,
        };
        on_layer(&progress, &result);
        outcome.results.insert(layer, result);
    }

    log::info!(
        "Session for {} complete, total {:.2}ms across {} timed layer(s)",
        request.domain,
        outcome.summary.total(),
        outcome.summary.entries().len()
    );
    outcome
}

fn log_result(layer: Layer, result: &ProbeResult) {
    if result.simulated.is_some() {
        log::info!("{}: {:?} (simulated)", layer, result.status);
        return;
    }
    match result.error() {
        None => log::info!("{}: {:?}", layer, result.status),
        Some(err) if layer == Layer::Traceroute => log::warn!(
            "{}: {} (expected in restricted network environments)",
            layer,
            err
        ),
        Some(err) => log::warn!("{}: {:?}: {}", layer, result.status, err),
    }
}
