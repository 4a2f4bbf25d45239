// Reference dataset
//
// The trusted baseline the drift test compares against: feature columns plus
// the ground-truth `prediction` code and `prediction_name` label. Columns are
// located by header name, so extra columns and reordering are tolerated.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::errors::{MonitorError, MonitorResult};
use crate::predictions::{split_row, FeatureVector};

/// One labelled reference row
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRow {
    pub features: FeatureVector,
    pub prediction: i64,
    pub prediction_name: String,
}

/// Reference data loaded from CSV
#[derive(Debug, Clone, Default)]
pub struct ReferenceDataset {
    rows: Vec<ReferenceRow>,
}

impl ReferenceDataset {
    pub fn new(rows: Vec<ReferenceRow>) -> Self {
        Self { rows }
    }

    /// Load and validate the reference CSV.
    ///
    /// Any unreadable file, missing column, or unparseable cell is a drift
    /// computation error: a partial baseline would skew every test.
    pub fn load(path: &Path) -> MonitorResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            MonitorError::DriftComputation(format!(
                "cannot read reference data {}: {}",
                path.display(),
                e
            ))
        })?;
        let dataset = Self::parse(&contents)?;
        debug!(rows = dataset.len(), path = %path.display(), "Reference data loaded");
        Ok(dataset)
    }

    pub fn parse(contents: &str) -> MonitorResult<Self> {
        let mut lines = contents.lines().filter(|l| !l.trim().is_empty());
        let header = lines
            .next()
            .ok_or_else(|| MonitorError::DriftComputation("reference data is empty".to_string()))?;
        let columns: Vec<String> = split_row(header)
            .into_iter()
            .map(|c| c.trim().to_string())
            .collect();

        let index_of = |name: &str| -> MonitorResult<usize> {
            columns.iter().position(|c| c == name).ok_or_else(|| {
                MonitorError::DriftComputation(format!("reference data has no '{}' column", name))
            })
        };
        let feature_idx = [
            index_of("sepal_length")?,
            index_of("sepal_width")?,
            index_of("petal_length")?,
            index_of("petal_width")?,
        ];
        let prediction_idx = index_of("prediction")?;
        let name_idx = index_of("prediction_name")?;

        let mut rows = Vec::new();
        for (line_no, line) in lines.enumerate() {
            let fields = split_row(line);
            if fields.len() != columns.len() {
                return Err(MonitorError::DriftComputation(format!(
                    "reference row {} has {} columns, expected {}",
                    line_no + 2,
                    fields.len(),
                    columns.len()
                )));
            }

            let cell = |idx: usize| -> MonitorResult<f64> {
                fields[idx].trim().parse().map_err(|_| {
                    MonitorError::DriftComputation(format!(
                        "reference row {}: bad {} value '{}'",
                        line_no + 2,
                        columns[idx],
                        fields[idx]
                    ))
                })
            };

            let features = FeatureVector::new(
                cell(feature_idx[0])?,
                cell(feature_idx[1])?,
                cell(feature_idx[2])?,
                cell(feature_idx[3])?,
            )
            .map_err(|e| MonitorError::DriftComputation(e.to_string()))?;
            let prediction = fields[prediction_idx].trim().parse().map_err(|_| {
                MonitorError::DriftComputation(format!(
                    "reference row {}: bad prediction code '{}'",
                    line_no + 2,
                    fields[prediction_idx]
                ))
            })?;

            rows.push(ReferenceRow {
                features,
                prediction,
                prediction_name: fields[name_idx].clone(),
            });
        }

        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[ReferenceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Values of one feature column, None for an unknown column
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        if !FeatureVector::NAMES.contains(&name) {
            return None;
        }
        Some(
            self.rows
                .iter()
                .filter_map(|r| r.features.get(name))
                .collect(),
        )
    }

    /// Row count per `prediction_name`
    pub fn class_distribution(&self) -> BTreeMap<String, u64> {
        let mut distribution = BTreeMap::new();
        for row in &self.rows {
            *distribution.entry(row.prediction_name.clone()).or_insert(0) += 1;
        }
        distribution
    }
}
