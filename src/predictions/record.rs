// Prediction data types and their CSV row encoding

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{MonitorError, MonitorResult};

/// Fixed column header of the prediction log
pub const LOG_HEADER: &str =
    "timestamp,sepal_length,sepal_width,petal_length,petal_width,prediction,prediction_name,confidence";

/// Number of columns in a log row
pub const LOG_COLUMNS: usize = 8;

/// Four Iris measurements, in the order the model was trained on
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub sepal_length: f64,
    pub sepal_width: f64,
    pub petal_length: f64,
    pub petal_width: f64,
}

impl FeatureVector {
    /// Column names in training order
    pub const NAMES: [&'static str; 4] = ["sepal_length", "sepal_width", "petal_length", "petal_width"];

    /// Build a feature vector, rejecting NaN and infinities.
    ///
    /// Ranges are not checked: out-of-range measurements pass through to the model.
    pub fn new(
        sepal_length: f64,
        sepal_width: f64,
        petal_length: f64,
        petal_width: f64,
    ) -> MonitorResult<Self> {
        let features = Self {
            sepal_length,
            sepal_width,
            petal_length,
            petal_width,
        };
        features.validate()?;
        Ok(features)
    }

    /// Check that every measurement is a finite number
    pub fn validate(&self) -> MonitorResult<()> {
        for (name, value) in Self::NAMES.iter().zip(self.as_array()) {
            if !value.is_finite() {
                return Err(MonitorError::InvalidInput(format!(
                    "{} must be a finite number, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn as_array(&self) -> [f64; 4] {
        [
            self.sepal_length,
            self.sepal_width,
            self.petal_length,
            self.petal_width,
        ]
    }

    /// Look up a measurement by column name
    pub fn get(&self, column: &str) -> Option<f64> {
        Self::NAMES
            .iter()
            .position(|name| *name == column)
            .map(|idx| self.as_array()[idx])
    }
}

/// One served prediction, as stored in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub features: FeatureVector,
    /// Raw class code returned by the model
    pub prediction: i64,
    pub prediction_name: String,
    pub confidence: f64,
}

impl PredictionRecord {
    pub fn new(
        features: FeatureVector,
        prediction: i64,
        prediction_name: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            features,
            prediction,
            prediction_name: prediction_name.into(),
            confidence,
        }
    }

    /// Encode as one CSV line, newline included.
    ///
    /// f64 `Display` is the shortest representation that parses back to the
    /// same value, so features survive a round trip exactly.
    pub fn to_csv_row(&self) -> String {
        format!(
            "{},{},{},{},{},{},{},{}\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.features.sepal_length,
            self.features.sepal_width,
            self.features.petal_length,
            self.features.petal_width,
            self.prediction,
            escape_field(&self.prediction_name),
            self.confidence,
        )
    }

    /// Parse one CSV line written by `to_csv_row`
    pub fn from_csv_row(line: &str) -> MonitorResult<Self> {
        let fields = split_row(line);
        if fields.len() != LOG_COLUMNS {
            return Err(MonitorError::logging_msg(format!(
                "expected {} columns, found {}",
                LOG_COLUMNS,
                fields.len()
            )));
        }

        let timestamp = DateTime::parse_from_rfc3339(&fields[0])
            .map_err(|e| MonitorError::logging_msg(format!("bad timestamp '{}': {}", fields[0], e)))?
            .with_timezone(&Utc);

        Ok(Self {
            timestamp,
            features: FeatureVector {
                sepal_length: parse_f64(&fields[1], "sepal_length")?,
                sepal_width: parse_f64(&fields[2], "sepal_width")?,
                petal_length: parse_f64(&fields[3], "petal_length")?,
                petal_width: parse_f64(&fields[4], "petal_width")?,
            },
            prediction: fields[5].trim().parse().map_err(|_| {
                MonitorError::logging_msg(format!("bad prediction code '{}'", fields[5]))
            })?,
            prediction_name: fields[6].clone(),
            confidence: parse_f64(&fields[7], "confidence")?,
        })
    }
}

fn parse_f64(raw: &str, column: &str) -> MonitorResult<f64> {
    raw.trim()
        .parse()
        .map_err(|_| MonitorError::logging_msg(format!("bad {} value '{}'", column, raw)))
}

/// Quote a field when it contains a separator, quote, or line break
pub(crate) fn escape_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Split one CSV line into fields, honoring double-quoted fields
pub(crate) fn split_row(line: &str) -> Vec<String> {
    let line = line.trim_end_matches(['\n', '\r']);
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}
