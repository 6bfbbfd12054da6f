pub mod builder;
pub mod console;
pub mod explain;

pub use builder::{DiagnosticReport, build_report, report_filename};
pub use console::Console;
pub use explain::{Explanation, ExplanationStatus, explain};
