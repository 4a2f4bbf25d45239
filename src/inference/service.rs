// Inference service
//
// Runs the loaded classifier on one feature vector, labels the result, and
// hands a record to the prediction recorder. Recording and metrics are best
// effort: a failed log append is reported through tracing and the prediction
// is still returned.

use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::errors::{MonitorError, MonitorResult};
use crate::metrics::MonitorMetrics;
use crate::model::{LoadedModel, ModelMetadata};
use crate::predictions::{FeatureVector, PredictionRecord, PredictionRecorder};

/// Label used when neither the metadata nor the artifact names a class
pub const FALLBACK_LABEL: &str = "unknown";

/// Result of one successful inference
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    /// Raw class code
    pub prediction: i64,
    pub prediction_name: String,
    pub probabilities: Vec<f64>,
    pub confidence: f64,
    pub model_version: String,
}

/// Owns the model for the lifetime of the server
pub struct InferenceService {
    model: Option<LoadedModel>,
    metadata: Option<ModelMetadata>,
    recorder: Arc<dyn PredictionRecorder>,
    metrics: Arc<MonitorMetrics>,
}

impl InferenceService {
    /// `model` and `metadata` are `None` when they failed to load at startup
    pub fn new(
        model: Option<LoadedModel>,
        metadata: Option<ModelMetadata>,
        recorder: Arc<dyn PredictionRecorder>,
        metrics: Arc<MonitorMetrics>,
    ) -> Self {
        Self {
            model,
            metadata,
            recorder,
            metrics,
        }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.model.is_some()
    }

    pub fn model(&self) -> Option<&LoadedModel> {
        self.model.as_ref()
    }

    pub fn metadata(&self) -> Option<&ModelMetadata> {
        self.metadata.as_ref()
    }

    /// Classify one feature vector and record the outcome
    pub fn predict(&self, features: &FeatureVector) -> MonitorResult<Prediction> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| MonitorError::ModelUnavailable("model not loaded".to_string()))?;
        let classifier = &model.classifier;

        let probabilities = classifier.predict_proba(features).map_err(|e| match e {
            MonitorError::InferenceFailure(_) => e,
            other => MonitorError::InferenceFailure(other.to_string()),
        })?;

        let classes = classifier.classes();
        if probabilities.is_empty() || probabilities.len() != classes.len() {
            return Err(MonitorError::InferenceFailure(format!(
                "model returned {} probabilities for {} classes",
                probabilities.len(),
                classes.len()
            )));
        }

        let best = argmax(&probabilities);
        let confidence = probabilities[best];
        let class_code = classes[best];
        let prediction_name = self.label_for(class_code, best);

        let record = PredictionRecord::new(*features, class_code, &prediction_name, confidence);
        if let Err(e) = self.recorder.record_prediction(&record) {
            error!(error = %e, prediction = %prediction_name, "Failed to record prediction");
        }
        self.metrics.observe_confidence(&prediction_name, confidence);

        info!(
            prediction = %prediction_name,
            confidence,
            "Prediction served"
        );

        Ok(Prediction {
            prediction: class_code,
            prediction_name,
            probabilities,
            confidence,
            model_version: classifier.version().to_string(),
        })
    }

    /// Metadata mapping first, then the artifact's class names, then the fallback
    fn label_for(&self, class_code: i64, class_index: usize) -> String {
        if let Some(label) = self.metadata.as_ref().and_then(|m| m.label_for(class_code)) {
            return label.to_string();
        }
        if let Some(model) = &self.model {
            if let Some(name) = model.classifier.class_names().get(class_index) {
                return name.clone();
            }
        }
        FALLBACK_LABEL.to_string()
    }
}

/// Index of the largest probability; ties go to the lowest index
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}
