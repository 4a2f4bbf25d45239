// Inference module
// Model invocation, labeling, and prediction recording

mod service;

pub use service::{InferenceService, Prediction, FALLBACK_LABEL};
