// Decision-tree ensemble classifier
//
// Evaluates a forest exported as JSON. Each tree is a flat node array; split
// nodes send `x <= threshold` left, leaves hold per-class weights. Class
// probabilities are the mean of the normalized leaf distributions, which is
// how a random forest's `predict_proba` is defined.

use serde::{Deserialize, Serialize};

use super::Classifier;
use crate::errors::{MonitorError, MonitorResult};
use crate::predictions::FeatureVector;

fn default_version() -> String {
    "1.0.0".to_string()
}

/// One node of a decision tree
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        /// Index into the artifact's `features` list
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Per-class weights (sample counts or fractions)
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Walk from the root to a leaf and return its normalized distribution
    fn leaf_distribution(&self, inputs: &[f64]) -> MonitorResult<Vec<f64>> {
        let mut idx = 0usize;
        // A well-formed tree reaches a leaf in fewer steps than it has nodes
        for _ in 0..=self.nodes.len() {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if inputs[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => {
                    let total: f64 = value.iter().sum();
                    if !(total > 0.0) {
                        return Err(MonitorError::InferenceFailure(
                            "leaf with zero total weight".to_string(),
                        ));
                    }
                    return Ok(value.iter().map(|v| v / total).collect());
                }
            }
        }
        Err(MonitorError::InferenceFailure(
            "tree traversal did not reach a leaf".to_string(),
        ))
    }
}

/// Serialized forest as exported by the training pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestArtifact {
    pub model_type: String,
    #[serde(default = "default_version")]
    pub version: String,
    /// Feature names in training order
    pub features: Vec<String>,
    /// Raw class codes, one per leaf weight
    pub classes: Vec<i64>,
    /// Optional human-readable names aligned with `classes`
    #[serde(default)]
    pub class_names: Vec<String>,
    pub trees: Vec<DecisionTree>,
}

/// Validated, ready-to-evaluate forest
#[derive(Debug, Clone)]
pub struct ForestClassifier {
    artifact: ForestArtifact,
    /// artifact feature position -> FeatureVector column
    feature_index: Vec<usize>,
}

impl ForestClassifier {
    pub fn from_artifact(artifact: ForestArtifact) -> MonitorResult<Self> {
        let unavailable = |msg: String| MonitorError::ModelUnavailable(msg);

        if artifact.trees.is_empty() {
            return Err(unavailable("forest has no trees".to_string()));
        }
        if artifact.classes.is_empty() {
            return Err(unavailable("forest declares no classes".to_string()));
        }
        if !artifact.class_names.is_empty() && artifact.class_names.len() != artifact.classes.len() {
            return Err(unavailable(format!(
                "{} class names for {} classes",
                artifact.class_names.len(),
                artifact.classes.len()
            )));
        }

        let feature_index = artifact
            .features
            .iter()
            .map(|name| {
                FeatureVector::NAMES
                    .iter()
                    .position(|known| known == name)
                    .ok_or_else(|| unavailable(format!("unknown feature '{}' in artifact", name)))
            })
            .collect::<MonitorResult<Vec<_>>>()?;

        for (t, tree) in artifact.trees.iter().enumerate() {
            if tree.nodes.is_empty() {
                return Err(unavailable(format!("tree {} is empty", t)));
            }
            for node in &tree.nodes {
                match node {
                    TreeNode::Split {
                        feature,
                        left,
                        right,
                        ..
                    } => {
                        if *feature >= feature_index.len() {
                            return Err(unavailable(format!(
                                "tree {} splits on feature {} of {}",
                                t,
                                feature,
                                feature_index.len()
                            )));
                        }
                        if *left >= tree.nodes.len() || *right >= tree.nodes.len() {
                            return Err(unavailable(format!("tree {} has a dangling child", t)));
                        }
                    }
                    TreeNode::Leaf { value } => {
                        if value.len() != artifact.classes.len() {
                            return Err(unavailable(format!(
                                "tree {} leaf has {} weights for {} classes",
                                t,
                                value.len(),
                                artifact.classes.len()
                            )));
                        }
                    }
                }
            }
        }

        Ok(Self {
            artifact,
            feature_index,
        })
    }

    pub fn from_json(json: &str) -> MonitorResult<Self> {
        let artifact: ForestArtifact = serde_json::from_str(json)
            .map_err(|e| MonitorError::ModelUnavailable(format!("invalid forest artifact: {}", e)))?;
        Self::from_artifact(artifact)
    }

    pub fn tree_count(&self) -> usize {
        self.artifact.trees.len()
    }

    /// Reorder a feature vector into the artifact's training order
    fn shape_inputs(&self, features: &FeatureVector) -> MonitorResult<Vec<f64>> {
        features
            .validate()
            .map_err(|e| MonitorError::InferenceFailure(e.to_string()))?;
        let values = features.as_array();
        Ok(self.feature_index.iter().map(|&col| values[col]).collect())
    }
}

impl Classifier for ForestClassifier {
    fn model_type(&self) -> &str {
        &self.artifact.model_type
    }

    fn version(&self) -> &str {
        &self.artifact.version
    }

    fn classes(&self) -> &[i64] {
        &self.artifact.classes
    }

    fn class_names(&self) -> &[String] {
        &self.artifact.class_names
    }

    fn predict_proba(&self, features: &FeatureVector) -> MonitorResult<Vec<f64>> {
        let inputs = self.shape_inputs(features)?;
        let mut sums = vec![0.0; self.artifact.classes.len()];

        for tree in &self.artifact.trees {
            for (sum, p) in sums.iter_mut().zip(tree.leaf_distribution(&inputs)?) {
                *sum += p;
            }
        }

        let n = self.artifact.trees.len() as f64;
        Ok(sums.into_iter().map(|s| s / n).collect())
    }
}
