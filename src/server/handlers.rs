// HTTP request handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    middleware,
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Extension, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;

use super::middleware::{telemetry_middleware, PredictedClass};
use super::AppState;
use crate::drift::{report, DriftSummary};
use crate::errors::MonitorError;
use crate::inference::Prediction;
use crate::predictions::{FeatureVector, PredictionStats};

/// Create the main application router.
///
/// Every route except `/metrics` runs inside the telemetry middleware; panics
/// are turned into 500 responses outside of it.
pub fn create_router(state: Arc<AppState>) -> Router {
    let telemetry =
        middleware::from_fn_with_state(Arc::clone(state.metrics()), telemetry_middleware);

    Router::new()
        .route("/", get(root))
        .route("/predict", post(predict))
        .route("/model-info", get(model_info))
        .route("/health", get(health_check))
        .route("/generate-sample", get(generate_sample))
        .route("/prediction-stats", get(prediction_stats))
        .route("/evidently/drift", get(drift_report))
        .route("/evidently/summary", get(summary_report))
        .route("/evidently/update-metrics", post(update_drift_metrics))
        .layer(telemetry)
        // Added after the telemetry layer so scrapes are not counted
        .route("/metrics", get(metrics_endpoint))
        .layer(CatchPanicLayer::new())
        .with_state(state)
}

/// Handle GET / - Service banner
async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Iris Classification API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "model_info": "/model-info",
            "predict": "/predict",
            "sample": "/generate-sample",
            "stats": "/prediction-stats",
            "metrics": "/metrics",
            "drift_report": "/evidently/drift",
            "summary_report": "/evidently/summary",
            "update_drift_metrics": "/evidently/update-metrics"
        }
    }))
}

/// Handle POST /predict - Classify one flower
async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<FeatureVector>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(features) =
        payload.map_err(|rejection| MonitorError::InvalidInput(rejection.body_text()))?;
    features.validate()?;

    let inference = Arc::clone(state.inference());
    let prediction: Prediction = tokio::task::spawn_blocking(move || inference.predict(&features))
        .await
        .map_err(|e| MonitorError::InferenceFailure(format!("inference task failed: {}", e)))??;

    let class = PredictedClass(prediction.prediction_name.clone());
    Ok((Extension(class), Json(prediction)).into_response())
}

/// Model metadata plus load status
#[derive(Debug, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub features: Vec<String>,
    pub target_names: Vec<String>,
    pub target_mapping: BTreeMap<String, String>,
    pub training_samples: u64,
    pub accuracy: f64,
    pub model_loaded: bool,
    /// SHA-256 of the loaded artifact
    pub artifact_sha256: Option<String>,
}

/// Handle GET /model-info
async fn model_info(State(state): State<Arc<AppState>>) -> Result<Json<ModelInfo>, AppError> {
    let inference = state.inference();
    let metadata = inference
        .metadata()
        .ok_or_else(|| MonitorError::ModelUnavailable("model metadata not loaded".to_string()))?;

    Ok(Json(ModelInfo {
        model_type: metadata.model_type.clone(),
        features: metadata.features.clone(),
        target_names: metadata.target_names.clone(),
        target_mapping: metadata.target_mapping.clone(),
        training_samples: metadata.training_samples,
        accuracy: metadata.accuracy,
        model_loaded: inference.is_model_loaded(),
        artifact_sha256: inference.model().map(|m| m.sha256.clone()),
    }))
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
    pub timestamp: String,
    pub uptime_seconds: u64,
}

/// Handle GET /health - Always 200, reports whether the model is usable
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "healthy".to_string(),
        model_loaded: state.inference().is_model_loaded(),
        timestamp: Utc::now().to_rfc3339(),
        uptime_seconds: state.uptime().as_secs(),
    })
}

/// One typical measurement set per species
#[derive(Debug, Serialize)]
pub struct SampleSets {
    pub setosa: FeatureVector,
    pub versicolor: FeatureVector,
    pub virginica: FeatureVector,
}

/// Handle GET /generate-sample
async fn generate_sample() -> Json<SampleSets> {
    Json(SampleSets {
        setosa: FeatureVector {
            sepal_length: 5.1,
            sepal_width: 3.5,
            petal_length: 1.4,
            petal_width: 0.2,
        },
        versicolor: FeatureVector {
            sepal_length: 6.0,
            sepal_width: 2.7,
            petal_length: 4.2,
            petal_width: 1.3,
        },
        virginica: FeatureVector {
            sepal_length: 6.7,
            sepal_width: 3.1,
            petal_length: 5.6,
            petal_width: 2.4,
        },
    })
}

/// Handle GET /prediction-stats
async fn prediction_stats(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PredictionStats>, AppError> {
    let log = Arc::clone(state.prediction_log());
    let stats = tokio::task::spawn_blocking(move || log.stats())
        .await
        .map_err(|e| anyhow::anyhow!("stats task failed: {}", e))??;
    Ok(Json(stats))
}

/// Handle GET /metrics - Prometheus text exposition
pub async fn metrics_endpoint(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let metrics = state.metrics();
    let body = metrics.encode()?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, metrics.content_type())],
        body,
    )
        .into_response())
}

/// Handle GET /evidently/drift - HTML drift report
async fn drift_report(State(state): State<Arc<AppState>>) -> Response {
    let drift = Arc::clone(state.drift());
    html_report(tokio::task::spawn_blocking(move || drift.drift_report()).await)
}

/// Handle GET /evidently/summary - HTML data summary report
async fn summary_report(State(state): State<Arc<AppState>>) -> Response {
    let drift = Arc::clone(state.drift());
    html_report(tokio::task::spawn_blocking(move || drift.summary_report()).await)
}

/// Report failures are served as an HTML error page, not JSON
fn html_report(
    result: Result<Result<String, MonitorError>, tokio::task::JoinError>,
) -> Response {
    match result {
        Ok(Ok(html)) => Html(html).into_response(),
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Report generation failed");
            (StatusCode::INTERNAL_SERVER_ERROR, Html(report::error_page(&e.to_string())))
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Report task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(report::error_page("report task failed")),
            )
                .into_response()
        }
    }
}

/// Response body for POST /evidently/update-metrics
#[derive(Debug, Serialize)]
pub struct UpdateMetricsResponse {
    pub status: String,
    pub message: String,
    pub summary: DriftSummary,
}

/// Handle POST /evidently/update-metrics - Recompute drift and republish gauges
async fn update_drift_metrics(
    State(state): State<Arc<AppState>>,
) -> Result<Json<UpdateMetricsResponse>, AppError> {
    let drift = Arc::clone(state.drift());
    let summary = tokio::task::spawn_blocking(move || drift.update_metrics())
        .await
        .map_err(|e| MonitorError::DriftComputation(format!("drift task failed: {}", e)))??;

    Ok(Json(UpdateMetricsResponse {
        status: "success".to_string(),
        message: "Drift metrics updated".to_string(),
        summary,
    }))
}

/// Application error wrapper for proper HTTP error responses
pub struct AppError(anyhow::Error);

impl AppError {
    fn status_and_type(&self) -> (StatusCode, &'static str) {
        match self.0.downcast_ref::<MonitorError>() {
            Some(MonitorError::InvalidInput(_)) => (StatusCode::UNPROCESSABLE_ENTITY, "invalid_input"),
            Some(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.kind()),
            None => (StatusCode::INTERNAL_SERVER_ERROR, "api_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type) = self.status_and_type();
        if status.is_server_error() {
            tracing::error!(error = %self.0, error_type, "Request failed");
        } else {
            tracing::warn!(error = %self.0, error_type, "Request rejected");
        }

        let body = serde_json::json!({
            "error": {
                "message": self.0.to_string(),
                "type": error_type
            }
        });

        (status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
