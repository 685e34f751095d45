//! Column-wise preprocessing: standard scaling and one-hot encoding
//!
//! Fitting and applying are separate steps. [`Preprocessor::fit`] learns
//! statistics from the training frame only and returns a
//! [`FittedPreprocessor`], which is then applied unchanged to the train,
//! test and full-dataset frames.

use crate::errors::{Result, RiskError};
use crate::features::{FeatureFrame, FeatureSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Dense row-major design matrix
pub type Matrix = Vec<Vec<f64>>;

/// Per-column mean and scale learned from training data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl StandardScaler {
    /// Population mean/std per column, ignoring missing cells
    pub fn fit(columns: usize, rows: &[&[Option<f64>]]) -> Self {
        let mut means = Vec::with_capacity(columns);
        let mut scales = Vec::with_capacity(columns);

        for j in 0..columns {
            let values: Vec<f64> = rows.iter().filter_map(|r| r[j]).collect();
            if values.is_empty() {
                means.push(0.0);
                scales.push(1.0);
                continue;
            }

            let n = values.len() as f64;
            let mean = values.iter().sum::<f64>() / n;
            let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();

            means.push(mean);
            // Constant columns pass through centred but unscaled
            scales.push(if std > f64::EPSILON * mean.abs().max(1.0) { std } else { 1.0 });
        }

        Self { means, scales }
    }

    /// Missing cells land on the training mean, i.e. 0.0
    pub fn transform_value(&self, column: usize, value: Option<f64>) -> f64 {
        match value {
            Some(v) => (v - self.means[column]) / self.scales[column],
            None => 0.0,
        }
    }
}

/// Sorted category vocabulary per column
///
/// A missing cell is its own category, ordered last. Values never seen during
/// fit encode as all zeros.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub categories: Vec<Vec<Option<String>>>,
}

impl OneHotEncoder {
    pub fn fit(columns: usize, rows: &[&[Option<String>]]) -> Self {
        let categories = (0..columns)
            .map(|j| {
                let mut values: Vec<Option<String>> = rows.iter().map(|r| r[j].clone()).collect();
                values.sort_by(|a, b| match (a, b) {
                    (Some(a), Some(b)) => a.cmp(b),
                    (Some(_), None) => std::cmp::Ordering::Less,
                    (None, Some(_)) => std::cmp::Ordering::Greater,
                    (None, None) => std::cmp::Ordering::Equal,
                });
                values.dedup();
                values
            })
            .collect();

        Self { categories }
    }

    pub fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    /// Append the indicator block for one row to `out`
    pub fn encode_into(&self, row: &[Option<String>], out: &mut Vec<f64>) {
        for (vocab, value) in self.categories.iter().zip(row) {
            let start = out.len();
            out.resize(start + vocab.len(), 0.0);
            if let Some(idx) = vocab.iter().position(|c| c == value) {
                out[start + idx] = 1.0;
            }
        }
    }
}

/// Unfitted preprocessing stage
pub struct Preprocessor;

impl Preprocessor {
    /// Learn scaling and encoding from the training frame
    #[instrument(skip(frame), fields(rows = frame.len()))]
    pub fn fit(frame: &FeatureFrame) -> FittedPreprocessor {
        let numeric_rows: Vec<&[Option<f64>]> = frame.rows.iter().map(|r| r.numerical.as_slice()).collect();
        let categorical_rows: Vec<&[Option<String>]> =
            frame.rows.iter().map(|r| r.categorical.as_slice()).collect();

        let scaler = StandardScaler::fit(frame.features.numerical.len(), &numeric_rows);
        let encoder = OneHotEncoder::fit(frame.features.categorical.len(), &categorical_rows);

        debug!(
            "Preprocessor fitted: {} scaled + {} one-hot columns",
            scaler.means.len(),
            encoder.width()
        );

        FittedPreprocessor {
            features: frame.features.clone(),
            scaler,
            encoder,
        }
    }
}

/// Fitted transformer, immutable once learned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    pub features: FeatureSet,
    pub scaler: StandardScaler,
    pub encoder: OneHotEncoder,
}

impl FittedPreprocessor {
    /// Number of columns in the output matrix
    pub fn output_width(&self) -> usize {
        self.scaler.means.len() + self.encoder.width()
    }

    /// Output column names, e.g. `Price`, `Region=North`, `Region=<missing>`
    pub fn output_names(&self) -> Vec<String> {
        let numeric = self.features.numerical.iter().map(|f| f.column().to_string());
        let categorical = self
            .features
            .categorical
            .iter()
            .zip(&self.encoder.categories)
            .flat_map(|(field, vocab)| {
                vocab.iter().map(move |c| {
                    format!("{}={}", field.column(), c.as_deref().unwrap_or("<missing>"))
                })
            });
        numeric.chain(categorical).collect()
    }

    /// Transform a frame with the fitted statistics
    pub fn apply(&self, frame: &FeatureFrame) -> Result<Matrix> {
        if frame.features != self.features {
            return Err(RiskError::FeatureMismatch {
                expected: self.features.len(),
                actual: frame.features.len(),
            });
        }

        let width = self.output_width();
        frame
            .rows
            .iter()
            .map(|row| {
                if row.numerical.len() != self.scaler.means.len()
                    || row.categorical.len() != self.encoder.categories.len()
                {
                    return Err(RiskError::FeatureMismatch {
                        expected: self.features.len(),
                        actual: row.numerical.len() + row.categorical.len(),
                    });
                }

                let mut out = Vec::with_capacity(width);
                out.extend(
                    row.numerical
                        .iter()
                        .enumerate()
                        .map(|(j, v)| self.scaler.transform_value(j, *v)),
                );
                self.encoder.encode_into(&row.categorical, &mut out);
                Ok(out)
            })
            .collect()
    }
}
