//! Feature selection and raw feature extraction
//!
//! The selector intersects the fixed candidate lists with the fields a
//! table actually carries. Extraction turns the selected columns into a
//! [`FeatureFrame`] of optional numbers and optional category labels, ready
//! for the preprocessing stage.

use crate::errors::{Result, RiskError};
use crate::schema::{Field, Schema, CATEGORICAL_CANDIDATES, NUMERICAL_CANDIDATES};
use crate::table::{OrderTable, Value};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Ordered feature columns used by every downstream stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub numerical: Vec<Field>,
    pub categorical: Vec<Field>,
}

impl FeatureSet {
    /// Keep the candidates present in `schema`, in declared order
    pub fn select(schema: &Schema) -> Self {
        let numerical: Vec<Field> = NUMERICAL_CANDIDATES.into_iter().filter(|f| schema.has(*f)).collect();
        let categorical: Vec<Field> = CATEGORICAL_CANDIDATES.into_iter().filter(|f| schema.has(*f)).collect();

        info!("Numerical features: {:?}", numerical);
        info!("Categorical features: {:?}", categorical);

        Self {
            numerical,
            categorical,
        }
    }

    /// Numerical columns followed by categorical columns
    pub fn columns(&self) -> Vec<Field> {
        self.numerical.iter().chain(self.categorical.iter()).copied().collect()
    }

    pub fn len(&self) -> usize {
        self.numerical.len() + self.categorical.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One row of raw features
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub numerical: Vec<Option<f64>>,
    pub categorical: Vec<Option<String>>,
}

/// Raw feature rows plus the set that produced them
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureFrame {
    pub features: FeatureSet,
    pub rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    /// Pull the selected columns out of a cleaned table
    pub fn extract(table: &OrderTable, features: &FeatureSet) -> Result<Self> {
        if features.is_empty() {
            return Err(RiskError::Schema("no feature columns present".into()));
        }

        let numeric_columns = features
            .numerical
            .iter()
            .map(|f| required_column(table, *f))
            .collect::<Result<Vec<_>>>()?;
        let categorical_columns = features
            .categorical
            .iter()
            .map(|f| required_column(table, *f))
            .collect::<Result<Vec<_>>>()?;

        let mut non_numeric = 0usize;
        let rows = (0..table.len())
            .map(|i| FeatureRow {
                numerical: numeric_columns
                    .iter()
                    .map(|column| {
                        let value = &column[i];
                        let number = value.as_f64();
                        if number.is_none() && !value.is_missing() {
                            non_numeric += 1;
                        }
                        number
                    })
                    .collect(),
                categorical: categorical_columns
                    .iter()
                    .map(|column| category_of(&column[i]))
                    .collect(),
            })
            .collect();

        if non_numeric > 0 {
            warn!("{} non-numeric cells in numerical features treated as missing", non_numeric);
        }

        Ok(Self {
            features: features.clone(),
            rows,
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Frame holding the given rows in the given order
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.clone(),
            rows: indices.iter().map(|&i| self.rows[i].clone()).collect(),
        }
    }
}

fn required_column(table: &OrderTable, field: Field) -> Result<&[Value]> {
    table
        .field(field)
        .ok_or_else(|| RiskError::Schema(format!("feature column '{}' not present", field)))
}

fn category_of(value: &Value) -> Option<String> {
    match value {
        Value::Missing => None,
        other => Some(other.render()),
    }
}
