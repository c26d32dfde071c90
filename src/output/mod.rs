mod exports;
mod progress;
mod styling;
mod summary;
mod tables;

pub use exports::export_report;
pub use progress::PhaseProgress;
use styling::{brand, label};
pub use summary::{print_collect_summary, CollectSummary, PipelineCollect};

/// Prints the citrend banner to stderr.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        brand("⏱  citrend"),
        label(env!("CARGO_PKG_VERSION")),
        label("CI Job Timing Regression Tracker")
    );
}
