// Prediction log module
// Records every served prediction and answers history queries

mod record;
mod stats;
mod store;

pub use record::{FeatureVector, PredictionRecord, LOG_COLUMNS, LOG_HEADER};
pub use stats::PredictionStats;
pub use store::{CsvPredictionLog, MemoryPredictionLog, PredictionLog, PredictionRecorder};

pub(crate) use record::split_row;
