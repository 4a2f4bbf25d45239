// Shared setup for integration tests

#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

use iris_monitor::config::Config;
use iris_monitor::server::{create_router, AppState};

/// Path to a file shipped with the crate
pub fn repo_path(relative: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join(relative)
}

/// Router plus the state and scratch directory behind it
pub struct TestApp {
    pub dir: TempDir,
    pub state: Arc<AppState>,
    pub router: Router,
}

impl TestApp {
    /// Bundled model, metadata, and reference data; log and reports in a temp dir
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Same as `new` but without a model or metadata on disk
    pub fn without_model() -> Self {
        Self::with_config(|config| {
            config.model.path = PathBuf::from("/nonexistent/iris_forest.json");
            config.model.metadata_path = PathBuf::from("/nonexistent/model_metadata.json");
        })
    }

    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.model.path = repo_path("models/iris_forest.json");
        config.model.metadata_path = repo_path("models/model_metadata.json");
        config.drift.reference_path = repo_path("data/reference_data.csv");
        config.predictions.log_path = dir.path().join("logfiles/predictions_log.csv");
        config.drift.reports_dir = dir.path().join("reports");
        adjust(&mut config);

        let state = Arc::new(AppState::from_config(&config).unwrap());
        let router = create_router(Arc::clone(&state));
        Self { dir, state, router }
    }

    pub async fn get(&self, uri: &str) -> Response {
        self.send(Method::GET, uri, Body::empty()).await
    }

    pub async fn post_json(&self, uri: &str, json: serde_json::Value) -> Response {
        self.send(Method::POST, uri, Body::from(json.to_string()))
            .await
    }

    pub async fn post_raw(&self, uri: &str, body: &str) -> Response {
        self.send(Method::POST, uri, Body::from(body.to_string()))
            .await
    }

    async fn send(&self, method: Method, uri: &str, body: Body) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(body)
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn predict(&self, features: [f64; 4]) -> Response {
        self.post_json(
            "/predict",
            serde_json::json!({
                "sepal_length": features[0],
                "sepal_width": features[1],
                "petal_length": features[2],
                "petal_width": features[3],
            }),
        )
        .await
    }
}

pub async fn body_json(response: Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub fn assert_status(response: &Response, expected: StatusCode) {
    assert_eq!(response.status(), expected, "unexpected status");
}
