// Configuration structs
//
// Every section and field has a default, so an empty or partial TOML file is
// a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::drift::DriftSettings;
use crate::predictions::FeatureVector;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub predictions: PredictionsConfig,
    pub drift: DriftConfig,
    pub logging: LoggingConfig,
}

/// Configuration for the HTTP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8000")
    pub bind_address: String,
    /// Allow cross-origin requests from any origin
    pub cors_permissive: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
            cors_permissive: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Serialized classifier artifact
    pub path: PathBuf,
    pub metadata_path: PathBuf,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/iris_forest.json"),
            metadata_path: PathBuf::from("models/model_metadata.json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictionsConfig {
    pub log_path: PathBuf,
    /// Rotate the log once it reaches this size; unset keeps one file forever
    pub rotate_after_bytes: Option<u64>,
}

impl Default for PredictionsConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from("logfiles/predictions_log.csv"),
            rotate_after_bytes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    pub reference_path: PathBuf,
    pub reports_dir: PathBuf,
    /// Most recent predictions compared against the reference
    pub window_size: usize,
    pub column_p_value_threshold: f64,
    pub drift_share_threshold: f64,
    pub monitored_columns: Vec<String>,
    /// Refresh drift gauges in the background every N seconds (0 or unset = off)
    pub refresh_interval_secs: Option<u64>,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            reference_path: PathBuf::from("data/reference_data.csv"),
            reports_dir: PathBuf::from("reports"),
            window_size: 100,
            column_p_value_threshold: 0.05,
            drift_share_threshold: 0.5,
            monitored_columns: FeatureVector::NAMES.iter().map(|s| s.to_string()).collect(),
            refresh_interval_secs: None,
        }
    }
}

impl DriftConfig {
    pub fn settings(&self) -> DriftSettings {
        DriftSettings {
            window_size: self.window_size,
            column_p_value_threshold: self.column_p_value_threshold,
            drift_share_threshold: self.drift_share_threshold,
            monitored_columns: self.monitored_columns.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter used when RUST_LOG is unset
    pub level: String,
    /// Append logs here instead of stderr
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}
