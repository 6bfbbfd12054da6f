use std::collections::BTreeSet;

use crate::config::probe_config::FaultSettings;
use crate::probe::Layer;
use crate::probe::error::ProbeError;
use crate::probe::result::{Outcome, ProbeResult, Simulation};

/// Bounds of the injected delay offered to callers.
pub const MIN_DELAY_MS: u64 = 100;
pub const MAX_DELAY_MS: u64 = 2000;

/// Simulated degradation for one session. Built once from caller input and read by value;
/// probes never see it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultConfig {
    pub slow: BTreeSet<Layer>,
    pub fail: BTreeSet<Layer>,
    pub delay_ms: u64,
}

impl From<&FaultSettings> for FaultConfig {
    fn from(settings: &FaultSettings) -> Self {
        Self {
            slow: settings.slow.clone(),
            fail: settings.fail.clone(),
            delay_ms: settings.delay_ms,
        }
    }
}

impl FaultConfig {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.slow.is_empty() || !self.fail.is_empty()
    }

    /// Whether `layer` is replaced by a simulated failure instead of being probed.
    pub fn fails(&self, layer: Layer) -> bool {
        self.fail.contains(&layer)
    }

    /// Synthetic failure result standing in for a probe that was never run.
    pub fn simulated_failure(&self, layer: Layer) -> ProbeResult {
        let mut result = ProbeResult::failure(layer, &ProbeError::Simulated);
        result.simulated = Some(Simulation::Failure);
        result
    }

    /// Adds the configured delay to the headline latency of a successful result for a
    /// targeted layer and tags it. Anything else is returned untouched.
    pub fn apply(&self, layer: Layer, mut result: ProbeResult) -> ProbeResult {
        if !self.slow.contains(&layer) {
            return result;
        }

        let delay_ms = self.delay_ms;
        let injected = match &mut result.outcome {
            Outcome::Success(payload) => match payload.headline_latency_mut() {
                Some(latency) => {
                    *latency += delay_ms as f64;
                    true
                }
                None => false,
            },
            Outcome::Failure(_) => false,
        };

        if injected {
            result.simulated = Some(Simulation::Latency { delay_ms });
        } else {
            log::debug!(
                "Slow {} requested but the result has no latency to inflate",
                layer
            );
        }
        result
    }
}
