//! Dataset assembly and deterministic stratified splitting
//!
//! Turns a cleaned order table into feature rows plus 0/1 labels, and
//! partitions row indices into train/test sets that keep the class ratio.

use crate::deterministic::LcgRng;
use crate::errors::TrainerError;
use return_risk_core::{Field, FeatureFrame, FeatureSet, OrderTable, Value};
use tracing::{debug, info};

/// Feature rows and labels for every cleaned order
#[derive(Clone, Debug)]
pub struct Dataset {
    pub frame: FeatureFrame,
    pub labels: Vec<u8>,
}

impl Dataset {
    /// Extract the selected features and `Return_Flag` from a cleaned table
    pub fn from_table(table: &OrderTable, features: &FeatureSet) -> Result<Self, TrainerError> {
        let labels = labels_of(table)?;
        let frame = FeatureFrame::extract(table, features)?;
        Ok(Self { frame, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positives(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// Rows at the given indices, in that order
    pub fn subset(&self, indices: &[usize]) -> Self {
        Self {
            frame: self.frame.select_rows(indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }
}

/// Read the cleaned `Return_Flag` column as 0/1 labels
pub fn labels_of(table: &OrderTable) -> Result<Vec<u8>, TrainerError> {
    let column = table
        .field(Field::ReturnFlag)
        .ok_or_else(|| TrainerError::Dataset("Return_Flag column missing".into()))?;

    column
        .iter()
        .enumerate()
        .map(|(row, value)| match value {
            Value::Int(0) => Ok(0),
            Value::Int(1) => Ok(1),
            other => Err(TrainerError::Dataset(format!(
                "row {}: Return_Flag {:?} is not a cleaned 0/1 label",
                row + 1,
                other
            ))),
        })
        .collect()
}

/// Train/test row indices
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified shuffle split
///
/// The test set takes `ceil(test_fraction · n)` rows. Each class contributes
/// to the training set in proportion to its size, remainders going to the
/// classes with the largest fractional share.
pub fn stratified_split(labels: &[u8], test_fraction: f64, seed: u64) -> Result<Split, TrainerError> {
    let n = labels.len();
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(TrainerError::Config(format!(
            "test_fraction must be within (0, 1), got {}",
            test_fraction
        )));
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);

    let mut classes: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in labels.iter().enumerate() {
        classes[usize::from(label == 1)].push(i);
    }

    if let Some(class) = classes.iter().position(|members| members.len() < 2) {
        return Err(TrainerError::Dataset(format!(
            "class {} has {} rows; stratified splitting needs at least 2 per class",
            class,
            classes[class].len()
        )));
    }
    if n_train < 2 || n_test < 2 {
        return Err(TrainerError::Dataset(format!(
            "{} rows cannot be split into train/test sets holding both classes",
            n
        )));
    }

    // Proportional allocation of training rows, largest remainder first
    let exact: Vec<f64> = classes
        .iter()
        .map(|members| n_train as f64 * members.len() as f64 / n as f64)
        .collect();
    let mut train_counts: Vec<usize> = exact.iter().map(|e| e.floor() as usize).collect();
    let mut remaining = n_train - train_counts.iter().sum::<usize>();
    let mut by_remainder: Vec<usize> = (0..classes.len()).collect();
    by_remainder.sort_by(|&a, &b| (exact[b] - exact[b].floor()).total_cmp(&(exact[a] - exact[a].floor())));
    for class in by_remainder {
        if remaining == 0 {
            break;
        }
        if train_counts[class] < classes[class].len() {
            train_counts[class] += 1;
            remaining -= 1;
        }
    }

    // Each class keeps at least one row on either side
    for (class, members) in classes.iter().enumerate() {
        if train_counts[class] == 0 {
            train_counts[class] = 1;
        } else if train_counts[class] == members.len() {
            train_counts[class] -= 1;
        }
    }

    let mut rng = LcgRng::new(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for (members, &count) in classes.iter_mut().zip(&train_counts) {
        rng.shuffle(members);
        train.extend_from_slice(&members[..count]);
        test.extend_from_slice(&members[count..]);
    }
    rng.shuffle(&mut train);
    rng.shuffle(&mut test);

    debug!("Train class counts: {:?}", train_counts);
    info!("Split {} rows into {} train / {} test", n, train.len(), test.len());
    Ok(Split { train, test })
}
