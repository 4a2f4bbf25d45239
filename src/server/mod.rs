// Iris Monitor - Server Module
// HTTP serving of the classifier with request, prediction, and drift telemetry

mod handlers;
mod middleware;
mod scheduler;

pub use handlers::{create_router, health_check, metrics_endpoint, AppError};
pub use middleware::{
    telemetry_middleware, PredictedClass, PREDICT_ROUTE, REQUEST_ID_HEADER, UNMATCHED_ROUTE,
};
pub use scheduler::DriftScheduler;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::{Config, ServerConfig};
use crate::drift::DriftAggregator;
use crate::inference::InferenceService;
use crate::metrics::MonitorMetrics;
use crate::model::{load_model, ModelMetadata};
use crate::predictions::{CsvPredictionLog, PredictionLog, PredictionRecorder};

/// Shared state handed to every handler
pub struct AppState {
    inference: Arc<InferenceService>,
    prediction_log: Arc<dyn PredictionLog>,
    metrics: Arc<MonitorMetrics>,
    drift: Arc<DriftAggregator>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        inference: Arc<InferenceService>,
        prediction_log: Arc<dyn PredictionLog>,
        metrics: Arc<MonitorMetrics>,
        drift: Arc<DriftAggregator>,
    ) -> Self {
        Self {
            inference,
            prediction_log,
            metrics,
            drift,
            started_at: Instant::now(),
        }
    }

    /// Wire every component from configuration.
    ///
    /// A missing or broken model or metadata file is not fatal: the server
    /// starts and reports `model_loaded: false`. An unusable prediction log is.
    pub fn from_config(config: &Config) -> Result<Self> {
        let metrics =
            Arc::new(MonitorMetrics::new().context("Failed to register Prometheus metrics")?);

        let csv_log = Arc::new(
            CsvPredictionLog::open(
                &config.predictions.log_path,
                config.predictions.rotate_after_bytes,
            )
            .context("Failed to open prediction log")?,
        );
        let recorder: Arc<dyn PredictionRecorder> = csv_log.clone();
        let log: Arc<dyn PredictionLog> = csv_log;

        let model = match load_model(&config.model.path) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(error = %e, "Serving without a model");
                None
            }
        };
        let metadata = match ModelMetadata::load(&config.model.metadata_path) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(error = %e, "Serving without model metadata");
                None
            }
        };

        let inference = Arc::new(InferenceService::new(
            model,
            metadata,
            recorder,
            Arc::clone(&metrics),
        ));
        let drift = Arc::new(DriftAggregator::new(
            config.drift.reference_path.clone(),
            config.drift.reports_dir.clone(),
            Arc::clone(&log),
            Arc::clone(&metrics),
            config.drift.settings(),
        ));

        Ok(Self::new(inference, log, metrics, drift))
    }

    pub fn inference(&self) -> &Arc<InferenceService> {
        &self.inference
    }

    pub fn prediction_log(&self) -> &Arc<dyn PredictionLog> {
        &self.prediction_log
    }

    pub fn metrics(&self) -> &Arc<MonitorMetrics> {
        &self.metrics
    }

    pub fn drift(&self) -> &Arc<DriftAggregator> {
        &self.drift
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Main monitor server structure
pub struct MonitorServer {
    state: Arc<AppState>,
    config: ServerConfig,
    /// Background drift refresh period, None to rely on external triggers
    drift_refresh: Option<Duration>,
}

impl MonitorServer {
    pub fn new(state: AppState, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(state),
            config,
            drift_refresh: None,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let state = AppState::from_config(config)?;
        let server = Self::new(state, config.server.clone());
        Ok(match config.drift.refresh_interval_secs {
            Some(secs) if secs > 0 => server.with_drift_refresh(Duration::from_secs(secs)),
            _ => server,
        })
    }

    pub fn with_drift_refresh(mut self, interval: Duration) -> Self {
        self.drift_refresh = Some(interval);
        self
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Full router with tracing and CORS layers
    pub fn router(&self) -> axum::Router {
        let app = create_router(Arc::clone(&self.state)).layer(TraceLayer::new_for_http());
        if self.config.cors_permissive {
            app.layer(CorsLayer::permissive())
        } else {
            app
        }
    }

    /// Start the HTTP server and run until `shutdown` is cancelled
    pub async fn serve(self, shutdown: CancellationToken) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .bind_address
            .parse()
            .with_context(|| format!("Invalid bind address: {}", self.config.bind_address))?;

        let app = self.router();

        let scheduler = self.drift_refresh.map(|interval| {
            DriftScheduler::spawn(
                Arc::clone(self.state.drift()),
                interval,
                shutdown.child_token(),
            )
        });

        info!(
            %addr,
            model_loaded = self.state.inference().is_model_loaded(),
            "Starting Iris monitor server"
        );

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        let token = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { token.cancelled().await })
            .await?;

        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
        info!("Iris monitor server stopped");
        Ok(())
    }
}
