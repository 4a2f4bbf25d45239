// HTTP client for a running monitor server
//
// Provides MonitorClient for health checks, predictions, and externally
// triggered drift refreshes.

mod monitor_client;

pub use monitor_client::{
    DriftSummaryReply, HealthReport, MonitorClient, PredictionReply, UpdateMetricsReply,
};
