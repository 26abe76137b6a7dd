//! Report configuration and execution.

mod config;
mod runner;

pub use config::ReportConfig;
pub use runner::{run_report, Report, ReportInputs, SectionOutcome};
