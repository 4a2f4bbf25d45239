// Drift module
// Reference-vs-production comparison, gauge publication, and HTML reports

mod aggregator;
mod reference;
pub mod report;
mod stats;

pub use aggregator::{
    compute_summary, ColumnDrift, DriftAggregator, DriftSettings, DriftSummary, DRIFT_REPORT_FILE,
    SUMMARY_REPORT_FILE,
};
pub use reference::{ReferenceDataset, ReferenceRow};
pub use stats::{ks_two_sample, ColumnStats, KsResult};
