// Metrics module
// Process-wide Prometheus registry for request, prediction, and drift telemetry

mod registry;

pub use registry::{MonitorMetrics, ERROR_CLASS};
