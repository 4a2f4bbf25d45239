// Request telemetry middleware
//
// Counts in-flight requests, times `/predict`, and records the outcome of
// every request it wraps. The in-flight gauge is held by a drop guard, so it
// comes back down on every exit path: normal return, a panic in the handler,
// or the request future being dropped mid-flight.

use axum::{
    extract::{MatchedPath, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::metrics::{MonitorMetrics, ERROR_CLASS};

/// Route template of the inference endpoint
pub const PREDICT_ROUTE: &str = "/predict";

/// Endpoint label for requests that matched no route
pub const UNMATCHED_ROUTE: &str = "unmatched";

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Predicted class of a successful inference, set by the handler as a
/// response extension so the outcome counter can be labelled with it
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedClass(pub String);

/// Telemetry middleware, installed with `middleware::from_fn_with_state`
pub async fn telemetry_middleware(
    State(metrics): State<Arc<MonitorMetrics>>,
    matched: Option<MatchedPath>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().as_str().to_owned();
    let endpoint = matched
        .map(|m| m.as_str().to_owned())
        .unwrap_or_else(|| UNMATCHED_ROUTE.to_owned());
    let request_id = Uuid::new_v4();

    let span = info_span!(
        "request",
        request_id = %request_id,
        method = %method,
        endpoint = %endpoint
    );

    let mut guard = InFlightGuard::start(metrics, method, endpoint);
    let outcome = AssertUnwindSafe(next.run(request).instrument(span))
        .catch_unwind()
        .await;
    let mut response = match outcome {
        Ok(response) => response,
        Err(panic) => {
            // Count the failure, then let the panic continue to the outer layer
            guard.fail();
            std::panic::resume_unwind(panic);
        }
    };
    guard.finish(&response);

    if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Holds one unit of the in-flight gauge for the life of a request
struct InFlightGuard {
    metrics: Arc<MonitorMetrics>,
    method: String,
    endpoint: String,
    started: Instant,
    finished: bool,
}

impl InFlightGuard {
    fn start(metrics: Arc<MonitorMetrics>, method: String, endpoint: String) -> Self {
        metrics.active_requests.inc();
        Self {
            metrics,
            method,
            endpoint,
            started: Instant::now(),
            finished: false,
        }
    }

    fn is_predict(&self) -> bool {
        self.endpoint == PREDICT_ROUTE
    }

    fn finish(&mut self, response: &Response) {
        let status = response.status();
        let class = if status.is_success() {
            response
                .extensions()
                .get::<PredictedClass>()
                .map(|c| c.0.as_str())
                .unwrap_or(ERROR_CLASS)
        } else {
            ERROR_CLASS
        };
        self.record(status.as_u16(), class);
        self.finished = true;

        info!(
            method = %self.method,
            endpoint = %self.endpoint,
            status = status.as_u16(),
            latency_ms = self.started.elapsed().as_millis() as u64,
            "Request completed"
        );
    }

    fn fail(&mut self) {
        warn!(method = %self.method, endpoint = %self.endpoint, "Request handler panicked");
        self.record(500, ERROR_CLASS);
        self.finished = true;
    }

    fn record(&self, status: u16, prediction_class: &str) {
        if self.is_predict() {
            self.metrics
                .observe_latency(self.started.elapsed().as_secs_f64());
            self.metrics
                .record_prediction_outcome(prediction_class, status);
        } else {
            self.metrics
                .record_endpoint(&self.method, &self.endpoint, status);
        }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.metrics.active_requests.dec();
        if !self.finished {
            debug!(method = %self.method, endpoint = %self.endpoint, "Request cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Extension, Router};
    use tower::ServiceExt;

    fn app(metrics: Arc<MonitorMetrics>) -> Router {
        Router::new()
            .route("/health", get(|| async { "ok" }))
            .route(
                "/predict",
                get(|| async { (Extension(PredictedClass("setosa".to_string())), "ok") }),
            )
            .route("/items/:id", get(|| async { StatusCode::NOT_FOUND }))
            .layer(middleware::from_fn_with_state(metrics, telemetry_middleware))
    }

    async fn call(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_predict_outcome_uses_handler_class() {
        let metrics = Arc::new(MonitorMetrics::new().unwrap());
        let response = call(app(Arc::clone(&metrics)), "/predict").await;

        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(
            metrics
                .prediction_requests
                .with_label_values(&["setosa", "200"])
                .get(),
            1
        );
        assert_eq!(metrics.prediction_latency.get_sample_count(), 1);
        assert_eq!(metrics.active_requests.get(), 0);
    }

    #[tokio::test]
    async fn test_other_routes_use_template() {
        let metrics = Arc::new(MonitorMetrics::new().unwrap());
        call(app(Arc::clone(&metrics)), "/items/42").await;
        call(app(Arc::clone(&metrics)), "/health").await;

        assert_eq!(
            metrics
                .requests_by_endpoint
                .with_label_values(&["GET", "/items/:id", "404"])
                .get(),
            1
        );
        assert_eq!(
            metrics
                .requests_by_endpoint
                .with_label_values(&["GET", "/health", "200"])
                .get(),
            1
        );
        assert_eq!(metrics.prediction_latency.get_sample_count(), 0);
    }

    #[tokio::test]
    async fn test_panic_is_counted_and_rethrown() {
        let metrics = Arc::new(MonitorMetrics::new().unwrap());
        let app = Router::new()
            .route("/boom", get(|| async { panic!("boom") as () }))
            .layer(middleware::from_fn_with_state(
                Arc::clone(&metrics),
                telemetry_middleware,
            ))
            .layer(tower_http::catch_panic::CatchPanicLayer::new());

        let response = call(app, "/boom").await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(metrics.active_requests.get(), 0);
        assert_eq!(
            metrics
                .requests_by_endpoint
                .with_label_values(&["GET", "/boom", "500"])
                .get(),
            1
        );
    }

    #[test]
    fn test_guard_releases_without_finish() {
        let metrics = Arc::new(MonitorMetrics::new().unwrap());
        let guard = InFlightGuard::start(
            Arc::clone(&metrics),
            "POST".to_string(),
            PREDICT_ROUTE.to_string(),
        );
        assert_eq!(metrics.active_requests.get(), 1);
        drop(guard);
        assert_eq!(metrics.active_requests.get(), 0);
        // Cancellation is not an outcome
        assert_eq!(
            metrics
                .prediction_requests
                .with_label_values(&[ERROR_CLASS, "500"])
                .get(),
            0
        );
    }
}
