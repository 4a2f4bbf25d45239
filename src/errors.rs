// Error taxonomy for the serving and monitoring pipeline
//
// Library code returns `MonitorError` where the caller needs to tell failure
// classes apart (the HTTP layer maps each variant to a status code). Startup
// and CLI glue wraps these in `anyhow` with context, like the rest of the
// binary does.

use std::path::Path;
use thiserror::Error;

/// Result alias for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors produced by the inference, logging, and drift components
#[derive(Debug, Error)]
pub enum MonitorError {
    /// Model artifact or metadata failed to load at startup.
    ///
    /// Serving continues; endpoints that need the missing piece report 500.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Malformed feature payload, rejected before reaching the model.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unexpected error while shaping features or evaluating the model
    #[error("Inference failed: {0}")]
    InferenceFailure(String),

    /// Prediction log could not be written or read
    #[error("Prediction log error: {message}")]
    LoggingFailure {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Reference/current data unreadable or the statistical test failed
    #[error("Drift computation failed: {0}")]
    DriftComputation(String),

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl MonitorError {
    pub fn logging(message: impl Into<String>, source: std::io::Error) -> Self {
        Self::LoggingFailure {
            message: message.into(),
            source: Some(source),
        }
    }

    pub fn logging_msg(message: impl Into<String>) -> Self {
        Self::LoggingFailure {
            message: message.into(),
            source: None,
        }
    }

    /// Stable machine-readable name used in HTTP error bodies
    pub fn kind(&self) -> &'static str {
        match self {
            MonitorError::ModelUnavailable(_) => "model_unavailable",
            MonitorError::InvalidInput(_) => "invalid_input",
            MonitorError::InferenceFailure(_) => "inference_failure",
            MonitorError::LoggingFailure { .. } => "logging_failure",
            MonitorError::DriftComputation(_) => "drift_computation_error",
            MonitorError::Config(_) => "config_error",
            MonitorError::Io(_) => "io_error",
        }
    }
}

/// Format a missing model artifact message with hints for the operator
pub fn model_not_found_error(path: &Path) -> String {
    format!(
        "Model artifact not found: {}\n\n\
        Possible causes:\n\
        • The model has not been exported yet\n\
        • Wrong [model] path in the config file or IRIS_MONITOR_MODEL\n\n\
        The server keeps running; /predict answers 500 until the model is available.",
        path.display()
    )
}
