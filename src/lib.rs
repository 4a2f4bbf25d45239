// Iris Monitor - Classification serving with telemetry and drift monitoring
// Library exports

pub mod client; // HTTP client for a running server
pub mod config;
pub mod drift; // Reference-vs-production drift detection
pub mod errors;
pub mod inference;
pub mod metrics; // Prometheus registry
pub mod model; // Classifier artifact and metadata
pub mod predictions; // Prediction log
pub mod server; // HTTP server, telemetry middleware
