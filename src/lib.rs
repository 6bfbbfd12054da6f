// Public API - probes, session orchestration and report types
pub mod config;
pub mod probe;
pub mod report;
pub mod session;

// Command-line surface used by the binary
pub mod cli;
