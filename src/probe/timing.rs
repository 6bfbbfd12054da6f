use std::future::Future;
use std::time::{Duration, Instant};

/// Converts a duration to fractional milliseconds, the unit every report field uses.
pub fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Wall-clock stopwatch. Millisecond resolution is all the probes promise.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    started: Instant,
}

impl Stopwatch {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> f64 {
        millis(self.started.elapsed())
    }
}

/// Awaits `fut` and returns its output together with the elapsed milliseconds.
pub async fn timed<F: Future>(fut: F) -> (F::Output, f64) {
    let watch = Stopwatch::start();
    let output = fut.await;
    (output, watch.elapsed_ms())
}

/// Rounds to two decimals, as the reachability report does.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
