pub mod fault;
pub mod orchestrator;

pub use fault::FaultConfig;
pub use orchestrator::{LayerResults, Progress, SessionOutcome, SessionRequest, TimingSummary, run_session};
