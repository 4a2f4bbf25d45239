// Prometheus metrics registry
//
// One `MonitorMetrics` is built at startup and shared by handle. Each instance
// owns its own `Registry`, so tests can build isolated copies.

use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, HistogramVec, IntCounterVec, IntGauge,
    IntGaugeVec, Opts, Registry, TextEncoder,
};

/// Label used for failed predictions in place of a class name
pub const ERROR_CLASS: &str = "error";

const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0];
const CONFIDENCE_BUCKETS: &[f64] = &[0.1, 0.3, 0.5, 0.7, 0.9, 1.0];

/// Request, prediction, and drift metrics
#[derive(Clone)]
pub struct MonitorMetrics {
    registry: Registry,

    /// Inference requests by predicted class (or "error") and status code
    pub prediction_requests: IntCounterVec,
    pub prediction_latency: Histogram,
    pub prediction_confidence: HistogramVec,
    pub active_requests: IntGauge,
    /// Every non-prediction request by method, route, and status code
    pub requests_by_endpoint: IntCounterVec,

    pub dataset_drift_detected: IntGauge,
    pub drift_share: Gauge,
    pub drifted_columns_count: IntGauge,
    pub column_drift: IntGaugeVec,
    pub column_drift_p_value: GaugeVec,
    pub data_rows_count: IntGauge,
    pub prediction_class_distribution: IntGaugeVec,
    pub drift_last_update: Gauge,
}

impl MonitorMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let prediction_requests = IntCounterVec::new(
            Opts::new(
                "iris_prediction_requests_total",
                "Total number of Iris prediction requests",
            ),
            &["prediction_class", "status"],
        )?;
        registry.register(Box::new(prediction_requests.clone()))?;

        let prediction_latency = Histogram::with_opts(
            HistogramOpts::new(
                "iris_prediction_latency_seconds",
                "Iris prediction request latency",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        registry.register(Box::new(prediction_latency.clone()))?;

        let prediction_confidence = HistogramVec::new(
            HistogramOpts::new("iris_prediction_confidence", "Confidence of Iris predictions")
                .buckets(CONFIDENCE_BUCKETS.to_vec()),
            &["prediction_class"],
        )?;
        registry.register(Box::new(prediction_confidence.clone()))?;

        let active_requests = IntGauge::new(
            "iris_active_requests",
            "Number of active requests to the Iris API",
        )?;
        registry.register(Box::new(active_requests.clone()))?;

        let requests_by_endpoint = IntCounterVec::new(
            Opts::new("iris_requests_by_endpoint_total", "Total requests by endpoint"),
            &["method", "endpoint", "status_code"],
        )?;
        registry.register(Box::new(requests_by_endpoint.clone()))?;

        let dataset_drift_detected = IntGauge::new(
            "evidently_dataset_drift_detected",
            "Dataset drift detected (1) or not (0)",
        )?;
        registry.register(Box::new(dataset_drift_detected.clone()))?;

        let drift_share = Gauge::new(
            "evidently_drift_share",
            "Share of monitored columns that drifted",
        )?;
        registry.register(Box::new(drift_share.clone()))?;

        let drifted_columns_count = IntGauge::new(
            "evidently_drifted_columns_count",
            "Number of monitored columns that drifted",
        )?;
        registry.register(Box::new(drifted_columns_count.clone()))?;

        let column_drift = IntGaugeVec::new(
            Opts::new("evidently_column_drift", "Per-column drift flag (1 = drifted)"),
            &["column_name"],
        )?;
        registry.register(Box::new(column_drift.clone()))?;

        let column_drift_p_value = GaugeVec::new(
            Opts::new(
                "evidently_column_drift_p_value",
                "Per-column drift test p-value",
            ),
            &["column_name"],
        )?;
        registry.register(Box::new(column_drift_p_value.clone()))?;

        let data_rows_count = IntGauge::new(
            "evidently_data_rows_count",
            "Rows in the current drift window",
        )?;
        registry.register(Box::new(data_rows_count.clone()))?;

        let prediction_class_distribution = IntGaugeVec::new(
            Opts::new(
                "evidently_prediction_class_distribution",
                "Predicted class counts in the current drift window",
            ),
            &["class_name"],
        )?;
        registry.register(Box::new(prediction_class_distribution.clone()))?;

        let drift_last_update = Gauge::new(
            "evidently_last_update_timestamp_seconds",
            "Unix time of the last successful drift publication",
        )?;
        registry.register(Box::new(drift_last_update.clone()))?;

        Ok(Self {
            registry,
            prediction_requests,
            prediction_latency,
            prediction_confidence,
            active_requests,
            requests_by_endpoint,
            dataset_drift_detected,
            drift_share,
            drifted_columns_count,
            column_drift,
            column_drift_p_value,
            data_rows_count,
            prediction_class_distribution,
            drift_last_update,
        })
    }

    /// Current snapshot in the Prometheus text exposition format
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    pub fn content_type(&self) -> String {
        TextEncoder::new().format_type().to_string()
    }

    pub fn record_prediction_outcome(&self, prediction_class: &str, status: u16) {
        self.prediction_requests
            .with_label_values(&[prediction_class, &status.to_string()])
            .inc();
    }

    pub fn observe_latency(&self, seconds: f64) {
        self.prediction_latency.observe(seconds);
    }

    pub fn observe_confidence(&self, prediction_class: &str, confidence: f64) {
        self.prediction_confidence
            .with_label_values(&[prediction_class])
            .observe(confidence);
    }

    pub fn record_endpoint(&self, method: &str, endpoint: &str, status: u16) {
        self.requests_by_endpoint
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registries_are_independent() {
        let a = MonitorMetrics::new().unwrap();
        let b = MonitorMetrics::new().unwrap();
        a.active_requests.inc();
        assert_eq!(a.active_requests.get(), 1);
        assert_eq!(b.active_requests.get(), 0);
    }

    #[test]
    fn test_encode_contains_series() {
        let metrics = MonitorMetrics::new().unwrap();
        metrics.record_prediction_outcome("setosa", 200);
        metrics.observe_latency(0.02);
        metrics.observe_confidence("setosa", 0.95);
        metrics.record_endpoint("GET", "/health", 200);

        let text = metrics.encode().unwrap();
        assert!(text.contains(r#"iris_prediction_requests_total{prediction_class="setosa",status="200"} 1"#));
        assert!(text.contains("iris_prediction_latency_seconds_count 1"));
        assert!(text.contains("iris_prediction_confidence_count{prediction_class=\"setosa\"} 1"));
        let endpoint_line = text
            .lines()
            .find(|l| l.starts_with("iris_requests_by_endpoint_total{"))
            .unwrap();
        assert!(endpoint_line.contains(r#"endpoint="/health""#));
        assert!(endpoint_line.contains(r#"method="GET""#));
        assert!(endpoint_line.ends_with(" 1"));
        assert!(text.contains("iris_active_requests 0"));
    }

    #[test]
    fn test_content_type_is_text_format() {
        let metrics = MonitorMetrics::new().unwrap();
        assert!(metrics.content_type().starts_with("text/plain"));
    }
}
