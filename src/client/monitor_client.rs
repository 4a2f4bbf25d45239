// Monitor client implementation
//
// HTTP client for a running iris-monitor server. Used by the `trigger`
// command to refresh drift gauges on a schedule.

use anyhow::{bail, Context, Result};
use reqwest::{Client, Response};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use crate::predictions::FeatureVector;

/// Health report returned by GET /health
#[derive(Debug, Clone, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub model_loaded: bool,
    pub timestamp: String,
    #[serde(default)]
    pub uptime_seconds: u64,
}

/// Prediction returned by POST /predict
#[derive(Debug, Clone, Deserialize)]
pub struct PredictionReply {
    pub prediction: i64,
    pub prediction_name: String,
    pub probabilities: Vec<f64>,
    pub confidence: f64,
    pub model_version: String,
}

/// Drift summary as seen by a client
#[derive(Debug, Clone, Deserialize)]
pub struct DriftSummaryReply {
    pub dataset_drift_detected: bool,
    pub drift_share: f64,
    pub drifted_columns_count: usize,
    pub num_rows: usize,
    #[serde(default)]
    pub class_distribution: BTreeMap<String, u64>,
}

/// Reply to POST /evidently/update-metrics
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMetricsReply {
    pub status: String,
    pub message: String,
    pub summary: DriftSummaryReply,
}

/// HTTP client for communicating with an iris-monitor server
pub struct MonitorClient {
    base_url: String,
    client: Client,
}

impl MonitorClient {
    /// `base_url` like "http://127.0.0.1:8000"; a trailing slash is ignored
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn health(&self) -> Result<HealthReport> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Server is not reachable")?;
        check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse health response")
    }

    pub async fn predict(&self, features: &FeatureVector) -> Result<PredictionReply> {
        let url = format!("{}/predict", self.base_url);
        debug!(url = %url, "Sending prediction request");
        let response = self
            .client
            .post(&url)
            .json(features)
            .send()
            .await
            .context("Failed to send prediction request")?;
        check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse prediction response")
    }

    /// Ask the server to recompute drift and republish its gauges
    pub async fn update_drift_metrics(&self) -> Result<UpdateMetricsReply> {
        let url = format!("{}/evidently/update-metrics", self.base_url);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("Failed to send drift update request")?;
        check_status(response)
            .await?
            .json()
            .await
            .context("Failed to parse drift update response")
    }
}

/// Turn a non-2xx reply into an error carrying the server's message
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);
    bail!("Server returned {}: {}", status, message)
}
