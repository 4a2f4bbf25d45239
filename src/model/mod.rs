// Model module
// Loads the pre-trained classifier artifact and its metadata

mod forest;
mod metadata;

pub use forest::{DecisionTree, ForestArtifact, ForestClassifier, TreeNode};
pub use metadata::ModelMetadata;

use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::errors::{MonitorError, MonitorResult};
use crate::predictions::FeatureVector;

/// A trained classifier, read-only after load and shared by all requests
pub trait Classifier: Send + Sync {
    fn model_type(&self) -> &str;

    fn version(&self) -> &str;

    /// Raw class codes, aligned with `predict_proba` output
    fn classes(&self) -> &[i64];

    /// Human-readable class names aligned with `classes`, possibly empty
    fn class_names(&self) -> &[String];

    /// Per-class probabilities for one feature vector
    fn predict_proba(&self, features: &FeatureVector) -> MonitorResult<Vec<f64>>;
}

/// Classifier plus the fingerprint of the file it came from
#[derive(Clone)]
pub struct LoadedModel {
    pub classifier: Arc<dyn Classifier>,
    /// Hex SHA-256 of the artifact bytes
    pub sha256: String,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("model_type", &self.classifier.model_type())
            .field("version", &self.classifier.version())
            .field("sha256", &self.sha256)
            .finish()
    }
}

/// Load a forest artifact from disk
pub fn load_model(path: &Path) -> MonitorResult<LoadedModel> {
    if !path.exists() {
        return Err(MonitorError::ModelUnavailable(
            crate::errors::model_not_found_error(path),
        ));
    }

    let bytes = fs::read(path).map_err(|e| {
        MonitorError::ModelUnavailable(format!("cannot read {}: {}", path.display(), e))
    })?;
    let sha256 = format!("{:x}", Sha256::digest(&bytes));

    let json = String::from_utf8(bytes).map_err(|_| {
        MonitorError::ModelUnavailable(format!("{} is not UTF-8 JSON", path.display()))
    })?;
    let forest = ForestClassifier::from_json(&json)?;

    info!(
        path = %path.display(),
        model_type = forest.model_type(),
        version = forest.version(),
        trees = forest.tree_count(),
        sha256 = %sha256,
        "Loaded model artifact"
    );

    Ok(LoadedModel {
        classifier: Arc::new(forest),
        sha256,
    })
}
