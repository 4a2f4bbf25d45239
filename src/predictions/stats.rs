// Aggregate statistics over the prediction log

use serde::Serialize;
use std::collections::BTreeMap;

use super::PredictionRecord;

/// Summary of every prediction served so far
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionStats {
    pub total_predictions: usize,
    pub class_distribution: BTreeMap<String, u64>,
    pub average_confidence: f64,
    pub last_prediction: Option<PredictionRecord>,
}

impl PredictionStats {
    pub fn from_records(records: &[PredictionRecord]) -> Self {
        let mut class_distribution = BTreeMap::new();
        let mut confidence_sum = 0.0;

        for record in records {
            *class_distribution
                .entry(record.prediction_name.clone())
                .or_insert(0) += 1;
            confidence_sum += record.confidence;
        }

        let average_confidence = if records.is_empty() {
            0.0
        } else {
            confidence_sum / records.len() as f64
        };

        Self {
            total_predictions: records.len(),
            class_distribution,
            average_confidence,
            last_prediction: records.last().cloned(),
        }
    }
}
