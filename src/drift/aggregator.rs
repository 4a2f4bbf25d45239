// Drift aggregator
//
// Compares the most recent window of the prediction log with the reference
// dataset, one two-sample K-S test per monitored column, and republishes the
// result as Prometheus gauges. Computation only reads; publishing is the
// single write step and runs under a lock so concurrent refreshes cannot
// interleave their gauge updates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::reference::ReferenceDataset;
use super::report;
use super::stats::ks_two_sample;
use crate::errors::{MonitorError, MonitorResult};
use crate::metrics::MonitorMetrics;
use crate::predictions::{FeatureVector, PredictionLog, PredictionRecord};

/// File name of the saved drift report
pub const DRIFT_REPORT_FILE: &str = "data_drift_report.html";
/// File name of the saved data summary report
pub const SUMMARY_REPORT_FILE: &str = "data_summary_report.html";

/// Thresholds and window for one drift computation
#[derive(Debug, Clone, PartialEq)]
pub struct DriftSettings {
    /// Most recent log rows compared against the reference
    pub window_size: usize,
    /// A column drifts when its p-value is below this
    pub column_p_value_threshold: f64,
    /// Dataset drift when the drifted share exceeds this
    pub drift_share_threshold: f64,
    pub monitored_columns: Vec<String>,
}

impl Default for DriftSettings {
    fn default() -> Self {
        Self {
            window_size: 100,
            column_p_value_threshold: 0.05,
            drift_share_threshold: 0.5,
            monitored_columns: FeatureVector::NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Test result for one monitored column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDrift {
    pub column_name: String,
    pub stat_test: String,
    pub statistic: f64,
    pub p_value: f64,
    pub threshold: f64,
    pub drift_detected: bool,
}

/// Outcome of one drift computation, recomputed wholesale every cycle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriftSummary {
    pub dataset_drift_detected: bool,
    pub drift_share: f64,
    pub drifted_columns_count: usize,
    pub columns: Vec<ColumnDrift>,
    /// Rows in the current window
    pub num_rows: usize,
    pub reference_rows: usize,
    /// Predicted class counts in the current window, 0 for reference-only classes
    pub class_distribution: BTreeMap<String, u64>,
    pub computed_at: DateTime<Utc>,
}

/// Compare a current window against the reference.
///
/// Pure: no I/O and no metric updates.
pub fn compute_summary(
    reference: &ReferenceDataset,
    current: &[PredictionRecord],
    settings: &DriftSettings,
) -> MonitorResult<DriftSummary> {
    if settings.monitored_columns.is_empty() {
        return Err(MonitorError::DriftComputation(
            "no columns are monitored".to_string(),
        ));
    }
    if reference.is_empty() {
        return Err(MonitorError::DriftComputation(
            "reference data has no rows".to_string(),
        ));
    }
    if current.is_empty() {
        return Err(MonitorError::DriftComputation(
            "no predictions logged yet".to_string(),
        ));
    }

    let mut columns = Vec::with_capacity(settings.monitored_columns.len());
    for name in &settings.monitored_columns {
        let reference_values = reference.column(name).ok_or_else(|| {
            MonitorError::DriftComputation(format!("unknown monitored column '{}'", name))
        })?;
        let current_values: Vec<f64> = current
            .iter()
            .filter_map(|r| r.features.get(name))
            .collect();

        let ks = ks_two_sample(&reference_values, &current_values)?;
        columns.push(ColumnDrift {
            column_name: name.clone(),
            stat_test: "K-S p_value".to_string(),
            statistic: ks.statistic,
            p_value: ks.p_value,
            threshold: settings.column_p_value_threshold,
            drift_detected: ks.p_value < settings.column_p_value_threshold,
        });
    }

    let drifted_columns_count = columns.iter().filter(|c| c.drift_detected).count();
    let drift_share = drifted_columns_count as f64 / columns.len() as f64;

    let mut class_distribution: BTreeMap<String, u64> = reference
        .class_distribution()
        .into_keys()
        .map(|class| (class, 0))
        .collect();
    for record in current {
        *class_distribution
            .entry(record.prediction_name.clone())
            .or_insert(0) += 1;
    }

    Ok(DriftSummary {
        dataset_drift_detected: drift_share > settings.drift_share_threshold,
        drift_share,
        drifted_columns_count,
        columns,
        num_rows: current.len(),
        reference_rows: reference.len(),
        class_distribution,
        computed_at: Utc::now(),
    })
}

/// Owns the drift inputs and the gauges they feed
pub struct DriftAggregator {
    reference_path: PathBuf,
    reports_dir: PathBuf,
    log: Arc<dyn PredictionLog>,
    metrics: Arc<MonitorMetrics>,
    settings: DriftSettings,
    publish_lock: Mutex<()>,
}

impl DriftAggregator {
    pub fn new(
        reference_path: impl Into<PathBuf>,
        reports_dir: impl Into<PathBuf>,
        log: Arc<dyn PredictionLog>,
        metrics: Arc<MonitorMetrics>,
        settings: DriftSettings,
    ) -> Self {
        Self {
            reference_path: reference_path.into(),
            reports_dir: reports_dir.into(),
            log,
            metrics,
            settings,
            publish_lock: Mutex::new(()),
        }
    }

    pub fn settings(&self) -> &DriftSettings {
        &self.settings
    }

    pub fn reference_path(&self) -> &Path {
        &self.reference_path
    }

    /// Reference dataset and the current window, both read fresh
    pub fn load_windows(&self) -> MonitorResult<(ReferenceDataset, Vec<PredictionRecord>)> {
        let reference = ReferenceDataset::load(&self.reference_path)?;
        let current = self
            .log
            .read_recent(self.settings.window_size)
            .map_err(|e| MonitorError::DriftComputation(format!("cannot read current data: {}", e)))?;
        Ok((reference, current))
    }

    /// Compute drift without touching any gauge
    pub fn compute_drift(&self) -> MonitorResult<DriftSummary> {
        let (reference, current) = self.load_windows()?;
        compute_summary(&reference, &current, &self.settings)
    }

    /// Overwrite every drift gauge from one summary
    pub fn publish(&self, summary: &DriftSummary) -> MonitorResult<()> {
        let _guard = self
            .publish_lock
            .lock()
            .map_err(|_| MonitorError::DriftComputation("publish lock poisoned".to_string()))?;
        let m = &self.metrics;

        m.dataset_drift_detected
            .set(i64::from(summary.dataset_drift_detected));
        m.drift_share.set(summary.drift_share);
        m.drifted_columns_count
            .set(summary.drifted_columns_count as i64);
        for column in &summary.columns {
            m.column_drift
                .with_label_values(&[&column.column_name])
                .set(i64::from(column.drift_detected));
            m.column_drift_p_value
                .with_label_values(&[&column.column_name])
                .set(column.p_value);
        }
        m.data_rows_count.set(summary.num_rows as i64);
        // Classes that left the window must not keep their last count
        m.prediction_class_distribution.reset();
        for (class_name, count) in &summary.class_distribution {
            m.prediction_class_distribution
                .with_label_values(&[class_name])
                .set(*count as i64);
        }
        m.drift_last_update
            .set(summary.computed_at.timestamp_millis() as f64 / 1000.0);

        Ok(())
    }

    /// Compute then publish; on failure the gauges keep their previous values
    pub fn update_metrics(&self) -> MonitorResult<DriftSummary> {
        let summary = self.compute_drift()?;
        self.publish(&summary)?;
        info!(
            detected = summary.dataset_drift_detected,
            drift_share = summary.drift_share,
            drifted_columns = summary.drifted_columns_count,
            rows = summary.num_rows,
            "Drift metrics updated"
        );
        Ok(summary)
    }

    /// Per-column drift report as HTML
    pub fn drift_report_html(&self) -> MonitorResult<String> {
        let summary = self.compute_drift()?;
        Ok(report::drift_report_html(&summary))
    }

    /// Descriptive statistics of both windows as HTML
    pub fn summary_report_html(&self) -> MonitorResult<String> {
        let (reference, current) = self.load_windows()?;
        if current.is_empty() {
            return Err(MonitorError::DriftComputation(
                "no predictions logged yet".to_string(),
            ));
        }
        Ok(report::summary_report_html(&reference, &current))
    }

    /// Render the drift report and save a copy under the reports directory
    pub fn drift_report(&self) -> MonitorResult<String> {
        let html = self.drift_report_html()?;
        self.save_report(DRIFT_REPORT_FILE, &html);
        Ok(html)
    }

    /// Render the summary report and save a copy under the reports directory
    pub fn summary_report(&self) -> MonitorResult<String> {
        let html = self.summary_report_html()?;
        self.save_report(SUMMARY_REPORT_FILE, &html);
        Ok(html)
    }

    /// Saving is best effort; the rendered report is still served
    fn save_report(&self, file_name: &str, html: &str) {
        let path = self.reports_dir.join(file_name);
        let result = fs::create_dir_all(&self.reports_dir).and_then(|_| fs::write(&path, html));
        match result {
            Ok(()) => info!(path = %path.display(), "Report saved"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to save report"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::reference::ReferenceRow;
    use crate::predictions::MemoryPredictionLog;

    fn features(offset: f64, i: usize) -> FeatureVector {
        let x = i as f64 / 10.0;
        FeatureVector::new(5.0 + x + offset, 3.0 + x + offset, 1.5 + x + offset, 0.2 + x + offset)
            .unwrap()
    }

    fn reference(n: usize) -> ReferenceDataset {
        ReferenceDataset::new(
            (0..n)
                .map(|i| ReferenceRow {
                    features: features(0.0, i),
                    prediction: (i % 3) as i64,
                    prediction_name: ["setosa", "versicolor", "virginica"][i % 3].to_string(),
                })
                .collect(),
        )
    }

    fn window(n: usize, offset: f64) -> Vec<PredictionRecord> {
        (0..n)
            .map(|i| PredictionRecord::new(features(offset, i), 0, "setosa", 0.9))
            .collect()
    }

    #[test]
    fn test_identical_window_has_no_drift() {
        let reference = reference(30);
        let current = window(30, 0.0);
        let summary = compute_summary(&reference, &current, &DriftSettings::default()).unwrap();

        assert!(!summary.dataset_drift_detected);
        assert_eq!(summary.drift_share, 0.0);
        assert_eq!(summary.drifted_columns_count, 0);
        assert_eq!(summary.columns.len(), 4);
        assert_eq!(summary.num_rows, 30);
        assert!(summary.columns.iter().all(|c| c.p_value == 1.0));
    }

    #[test]
    fn test_shifted_window_drifts() {
        let summary =
            compute_summary(&reference(30), &window(30, 50.0), &DriftSettings::default()).unwrap();
        assert!(summary.dataset_drift_detected);
        assert_eq!(summary.drift_share, 1.0);
        assert_eq!(summary.drifted_columns_count, 4);
    }

    #[test]
    fn test_share_at_threshold_is_not_drift() {
        let mut current = window(30, 0.0);
        for record in &mut current {
            record.features.petal_length += 50.0;
            record.features.petal_width += 50.0;
        }
        let summary =
            compute_summary(&reference(30), &current, &DriftSettings::default()).unwrap();
        assert_eq!(summary.drifted_columns_count, 2);
        assert_eq!(summary.drift_share, 0.5);
        assert!(!summary.dataset_drift_detected);

        for record in &mut current {
            record.features.sepal_length += 50.0;
        }
        let summary =
            compute_summary(&reference(30), &current, &DriftSettings::default()).unwrap();
        assert_eq!(summary.drifted_columns_count, 3);
        assert!(summary.dataset_drift_detected);
    }

    #[test]
    fn test_class_distribution_includes_reference_classes() {
        let summary =
            compute_summary(&reference(30), &window(10, 0.0), &DriftSettings::default()).unwrap();
        assert_eq!(summary.class_distribution["setosa"], 10);
        assert_eq!(summary.class_distribution["versicolor"], 0);
        assert_eq!(summary.class_distribution["virginica"], 0);
    }

    #[test]
    fn test_empty_window_is_error() {
        let err = compute_summary(&reference(30), &[], &DriftSettings::default()).unwrap_err();
        assert!(matches!(err, MonitorError::DriftComputation(_)));
    }

    #[test]
    fn test_unknown_column_is_error() {
        let settings = DriftSettings {
            monitored_columns: vec!["petal_color".to_string()],
            ..DriftSettings::default()
        };
        assert!(compute_summary(&reference(30), &window(5, 0.0), &settings).is_err());
    }

    #[test]
    fn test_publish_overwrites_gauges() {
        let metrics = Arc::new(MonitorMetrics::new().unwrap());
        let aggregator = DriftAggregator::new(
            "unused.csv",
            "unused-reports",
            Arc::new(MemoryPredictionLog::new()),
            Arc::clone(&metrics),
            DriftSettings::default(),
        );

        let drifted =
            compute_summary(&reference(30), &window(30, 50.0), &DriftSettings::default()).unwrap();
        aggregator.publish(&drifted).unwrap();
        assert_eq!(metrics.dataset_drift_detected.get(), 1);
        assert_eq!(metrics.drifted_columns_count.get(), 4);
        assert_eq!(
            metrics
                .column_drift
                .with_label_values(&["petal_length"])
                .get(),
            1
        );
        assert!(metrics.drift_last_update.get() > 0.0);

        let clean =
            compute_summary(&reference(30), &window(30, 0.0), &DriftSettings::default()).unwrap();
        aggregator.publish(&clean).unwrap();
        assert_eq!(metrics.dataset_drift_detected.get(), 0);
        assert_eq!(metrics.drift_share.get(), 0.0);
        assert_eq!(
            metrics
                .column_drift_p_value
                .with_label_values(&["sepal_width"])
                .get(),
            1.0
        );
        assert_eq!(metrics.data_rows_count.get(), 30);
    }

    #[test]
    fn test_publish_drops_classes_that_left_the_window() {
        let metrics = Arc::new(MonitorMetrics::new().unwrap());
        let aggregator = DriftAggregator::new(
            "unused.csv",
            "unused-reports",
            Arc::new(MemoryPredictionLog::new()),
            Arc::clone(&metrics),
            DriftSettings::default(),
        );

        let mut with_unknown = window(10, 0.0);
        with_unknown[0].prediction_name = "unknown".to_string();
        let summary =
            compute_summary(&reference(30), &with_unknown, &DriftSettings::default()).unwrap();
        aggregator.publish(&summary).unwrap();
        assert!(metrics
            .encode()
            .unwrap()
            .contains(r#"evidently_prediction_class_distribution{class_name="unknown"} 1"#));

        let summary =
            compute_summary(&reference(30), &window(10, 0.0), &DriftSettings::default()).unwrap();
        aggregator.publish(&summary).unwrap();
        let text = metrics.encode().unwrap();
        assert!(!text.contains(r#"class_name="unknown""#));
        assert!(text.contains("evidently_prediction_class_distribution{"));
    }

    #[test]
    fn test_failed_update_leaves_gauges() {
        let metrics = Arc::new(MonitorMetrics::new().unwrap());
        metrics.drift_share.set(0.75);
        let aggregator = DriftAggregator::new(
            "missing-reference.csv",
            "unused-reports",
            Arc::new(MemoryPredictionLog::new()),
            Arc::clone(&metrics),
            DriftSettings::default(),
        );

        assert!(aggregator.update_metrics().is_err());
        assert_eq!(metrics.drift_share.get(), 0.75);
        assert_eq!(metrics.drift_last_update.get(), 0.0);
    }
}
