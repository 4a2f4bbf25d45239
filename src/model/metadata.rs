// Model metadata sidecar
// Describes the loaded model for /model-info and maps class codes to labels

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::errors::{MonitorError, MonitorResult};

/// Metadata written next to the model artifact by the training pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_type: String,
    /// Feature names in training order
    pub features: Vec<String>,
    pub target_names: Vec<String>,
    /// Class code (as string) -> human-readable label
    #[serde(default)]
    pub target_mapping: BTreeMap<String, String>,
    pub training_samples: u64,
    pub accuracy: f64,
}

impl ModelMetadata {
    pub fn load(path: &Path) -> MonitorResult<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            MonitorError::ModelUnavailable(format!(
                "cannot read model metadata {}: {}",
                path.display(),
                e
            ))
        })?;
        serde_json::from_str(&json).map_err(|e| {
            MonitorError::ModelUnavailable(format!(
                "invalid model metadata {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Label for a raw class code from the mapping table
    pub fn label_for(&self, class_code: i64) -> Option<&str> {
        self.target_mapping
            .get(&class_code.to_string())
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_and_map_labels() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model_metadata.json");
        fs::write(
            &path,
            r#"{
                "model_type": "RandomForestClassifier",
                "features": ["sepal_length", "sepal_width", "petal_length", "petal_width"],
                "target_names": ["setosa", "versicolor", "virginica"],
                "target_mapping": {"0": "setosa", "1": "versicolor", "2": "virginica"},
                "training_samples": 120,
                "accuracy": 0.9667
            }"#,
        )
        .unwrap();

        let metadata = ModelMetadata::load(&path).unwrap();
        assert_eq!(metadata.training_samples, 120);
        assert_eq!(metadata.label_for(1), Some("versicolor"));
        assert_eq!(metadata.label_for(7), None);
    }

    #[test]
    fn test_missing_file_is_model_unavailable() {
        let dir = TempDir::new().unwrap();
        let err = ModelMetadata::load(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, MonitorError::ModelUnavailable(_)));
    }
}
