// Integration tests for HTTP server

mod common;

use axum::http::StatusCode;
use common::{assert_status, body_json, body_text, TestApp};
use iris_monitor::predictions::PredictionLog;
use iris_monitor::server::REQUEST_ID_HEADER;

#[tokio::test]
async fn test_health_reports_model_loaded() {
    let app = TestApp::new();
    let response = app.get("/health").await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model_loaded"], true);
    assert!(body["timestamp"].is_string());
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_missing_model_still_serves() {
    let app = TestApp::without_model();

    let health = body_json(app.get("/health").await).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["model_loaded"], false);

    let response = app.predict([5.1, 3.5, 1.4, 0.2]).await;
    assert_status(&response, StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "model_unavailable");

    let response = app.get("/model-info").await;
    assert_status(&response, StatusCode::INTERNAL_SERVER_ERROR);

    // Failed predictions are never logged
    assert!(app.state.prediction_log().read_all().unwrap().is_empty());
    assert_eq!(
        app.state
            .metrics()
            .prediction_requests
            .with_label_values(&["error", "500"])
            .get(),
        1
    );
}

#[tokio::test]
async fn test_predict_setosa() {
    let app = TestApp::new();
    let response = app.predict([5.1, 3.5, 1.4, 0.2]).await;
    assert_status(&response, StatusCode::OK);
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let body = body_json(response).await;
    assert_eq!(body["prediction"], 0);
    assert_eq!(body["prediction_name"], "setosa");
    assert!(body["confidence"].as_f64().unwrap() > 0.5);
    assert_eq!(body["probabilities"].as_array().unwrap().len(), 3);
    assert_eq!(body["model_version"], "1.0.0");

    let records = app.state.prediction_log().read_all().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].features.petal_length, 1.4);
    assert_eq!(records[0].prediction_name, "setosa");

    let metrics = app.state.metrics();
    assert_eq!(
        metrics
            .prediction_requests
            .with_label_values(&["setosa", "200"])
            .get(),
        1
    );
    assert_eq!(metrics.prediction_latency.get_sample_count(), 1);
    assert_eq!(
        metrics
            .prediction_confidence
            .with_label_values(&["setosa"])
            .get_sample_count(),
        1
    );
    assert_eq!(metrics.active_requests.get(), 0);
}

#[tokio::test]
async fn test_predict_each_species() {
    let app = TestApp::new();
    let samples = body_json(app.get("/generate-sample").await).await;

    for species in ["setosa", "versicolor", "virginica"] {
        let response = app.post_json("/predict", samples[species].clone()).await;
        assert_status(&response, StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["prediction_name"], species);
    }
    assert_eq!(app.state.prediction_log().read_all().unwrap().len(), 3);
}

#[tokio::test]
async fn test_malformed_payload_is_422() {
    let app = TestApp::new();

    let missing_field = app
        .post_json(
            "/predict",
            serde_json::json!({"sepal_length": 5.1, "sepal_width": 3.5, "petal_length": 1.4}),
        )
        .await;
    assert_status(&missing_field, StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(missing_field).await;
    assert_eq!(body["error"]["type"], "invalid_input");

    let not_json = app.post_raw("/predict", "sepal_length=5.1").await;
    assert_status(&not_json, StatusCode::UNPROCESSABLE_ENTITY);

    let wrong_type = app
        .post_json(
            "/predict",
            serde_json::json!({
                "sepal_length": "long", "sepal_width": 3.5,
                "petal_length": 1.4, "petal_width": 0.2
            }),
        )
        .await;
    assert_status(&wrong_type, StatusCode::UNPROCESSABLE_ENTITY);

    assert!(app.state.prediction_log().read_all().unwrap().is_empty());
    assert_eq!(
        app.state
            .metrics()
            .prediction_requests
            .with_label_values(&["error", "422"])
            .get(),
        3
    );
}

#[tokio::test]
async fn test_out_of_range_values_pass_through() {
    let app = TestApp::new();
    let response = app.predict([-1.0, 0.0, 100.0, 50.0]).await;
    assert_status(&response, StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["prediction_name"], "virginica");
}

#[tokio::test]
async fn test_model_info() {
    let app = TestApp::new();
    let response = app.get("/model-info").await;
    assert_status(&response, StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["model_type"], "RandomForestClassifier");
    assert_eq!(body["features"].as_array().unwrap().len(), 4);
    assert_eq!(body["target_mapping"]["2"], "virginica");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["artifact_sha256"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn test_prediction_stats() {
    let app = TestApp::new();

    let empty = body_json(app.get("/prediction-stats").await).await;
    assert_eq!(empty["total_predictions"], 0);
    assert_eq!(empty["average_confidence"], 0.0);
    assert!(empty["class_distribution"].as_object().unwrap().is_empty());
    assert!(empty["last_prediction"].is_null());

    app.predict([5.1, 3.5, 1.4, 0.2]).await;
    app.predict([6.7, 3.1, 5.6, 2.4]).await;

    let stats = body_json(app.get("/prediction-stats").await).await;
    assert_eq!(stats["total_predictions"], 2);
    assert_eq!(stats["class_distribution"]["setosa"], 1);
    assert_eq!(stats["class_distribution"]["virginica"], 1);
    assert_eq!(stats["last_prediction"]["prediction_name"], "virginica");
    assert_eq!(stats["last_prediction"]["petal_width"], 2.4);
}

#[tokio::test]
async fn test_metrics_endpoint_is_not_counted() {
    let app = TestApp::new();
    app.get("/health").await;

    for _ in 0..2 {
        let response = app.get("/metrics").await;
        assert_status(&response, StatusCode::OK);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        let text = body_text(response).await;
        assert!(text.contains("iris_active_requests"));
        assert!(!text.contains(r#"endpoint="/metrics""#));
    }

    let metrics = app.state.metrics();
    assert_eq!(
        metrics
            .requests_by_endpoint
            .with_label_values(&["GET", "/health", "200"])
            .get(),
        1
    );
    assert_eq!(
        metrics
            .requests_by_endpoint
            .with_label_values(&["GET", "/metrics", "200"])
            .get(),
        0
    );
}

#[tokio::test]
async fn test_root_banner() {
    let app = TestApp::new();
    let body = body_json(app.get("/").await).await;
    assert_eq!(body["message"], "Iris Classification API");
    assert_eq!(body["endpoints"]["predict"], "/predict");
}

#[tokio::test]
async fn test_drift_endpoints_without_predictions() {
    let app = TestApp::new();

    let response = app.post_json("/evidently/update-metrics", serde_json::json!({})).await;
    assert_status(&response, StatusCode::INTERNAL_SERVER_ERROR);
    let body = body_json(response).await;
    assert_eq!(body["error"]["type"], "drift_computation_error");

    let response = app.get("/evidently/drift").await;
    assert_status(&response, StatusCode::INTERNAL_SERVER_ERROR);
    let html = body_text(response).await;
    assert!(html.contains("<html"));

    assert_eq!(app.state.metrics().drift_last_update.get(), 0.0);
}

#[tokio::test]
async fn test_drift_endpoints_after_predictions() {
    let app = TestApp::new();
    for _ in 0..5 {
        app.predict([5.1, 3.5, 1.4, 0.2]).await;
        app.predict([6.0, 2.7, 4.2, 1.3]).await;
        app.predict([6.7, 3.1, 5.6, 2.4]).await;
    }

    let response = app.post_json("/evidently/update-metrics", serde_json::json!({})).await;
    assert_status(&response, StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["summary"]["num_rows"], 15);
    assert_eq!(body["summary"]["columns"].as_array().unwrap().len(), 4);
    assert_eq!(body["summary"]["class_distribution"]["versicolor"], 5);

    let metrics = app.state.metrics();
    assert_eq!(metrics.data_rows_count.get(), 15);
    assert!(metrics.drift_last_update.get() > 0.0);
    assert_eq!(
        metrics
            .prediction_class_distribution
            .with_label_values(&["setosa"])
            .get(),
        5
    );

    let response = app.get("/evidently/drift").await;
    assert_status(&response, StatusCode::OK);
    assert!(body_text(response).await.contains("Data Drift Report"));
    assert!(app.dir.path().join("reports/data_drift_report.html").exists());

    let response = app.get("/evidently/summary").await;
    assert_status(&response, StatusCode::OK);
    assert!(body_text(response).await.contains("Data Summary Report"));
    assert!(app
        .dir
        .path()
        .join("reports/data_summary_report.html")
        .exists());
}
