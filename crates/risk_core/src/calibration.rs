//! Probability calibration
//!
//! [`IsotonicCalibrator`] fits a monotone non-decreasing map from decision
//! scores to outcome frequencies with the pool-adjacent-violators algorithm.
//! [`CalibratedClassifier`] cross-fits it: the training rows are split into
//! stratified folds, and each fold contributes one logistic model trained on
//! the other folds plus an isotonic map fitted on its own held-out scores.
//! Predictions average the calibrated probabilities of all fold members.

use crate::errors::{Result, RiskError};
use crate::logistic::{LogisticRegression, LogisticRegressionConfig};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Piecewise-linear monotone map, clipped outside the fitted range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsotonicCalibrator {
    /// Ascending score knots
    pub thresholds: Vec<f64>,
    /// Non-decreasing probabilities at each knot, within [0, 1]
    pub values: Vec<f64>,
}

impl IsotonicCalibrator {
    /// Fit on (score, label) pairs
    pub fn fit(scores: &[f64], labels: &[u8]) -> Result<Self> {
        if scores.len() != labels.len() {
            return Err(RiskError::Training(format!(
                "{} scores but {} labels",
                scores.len(),
                labels.len()
            )));
        }
        if scores.is_empty() {
            return Err(RiskError::Training("isotonic calibration needs at least one score".into()));
        }

        let mut pairs: Vec<(f64, f64)> = scores
            .iter()
            .zip(labels)
            .map(|(&s, &l)| (s, l as f64))
            .collect();
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Blocks of (label sum, weight, first score, last score)
        let mut blocks: Vec<(f64, f64, f64, f64)> = Vec::with_capacity(pairs.len());
        for (score, label) in pairs {
            match blocks.last_mut() {
                // Tied scores share one mean
                Some(last) if last.3 == score => {
                    last.0 += label;
                    last.1 += 1.0;
                }
                _ => blocks.push((label, 1.0, score, score)),
            }

            while blocks.len() >= 2 {
                let n = blocks.len();
                let (prev, last) = (blocks[n - 2], blocks[n - 1]);
                if prev.0 / prev.1 <= last.0 / last.1 {
                    break;
                }
                blocks[n - 2] = (prev.0 + last.0, prev.1 + last.1, prev.2, last.3);
                blocks.pop();
            }
        }

        let mut thresholds = Vec::with_capacity(blocks.len() * 2);
        let mut values = Vec::with_capacity(blocks.len() * 2);
        for (sum, weight, first, last) in blocks {
            let mean = (sum / weight).clamp(0.0, 1.0);
            thresholds.push(first);
            values.push(mean);
            if last > first {
                thresholds.push(last);
                values.push(mean);
            }
        }

        Ok(Self { thresholds, values })
    }

    /// Calibrated probability for a decision score
    pub fn calibrate(&self, score: f64) -> f64 {
        let (Some(&first), Some(&last)) = (self.values.first(), self.values.last()) else {
            return 0.0;
        };
        if score.is_nan() || score <= self.thresholds[0] {
            return first;
        }
        if score >= self.thresholds[self.thresholds.len() - 1] {
            return last;
        }

        // First knot strictly above the score; the score lies in [hi-1, hi)
        let hi = self.thresholds.partition_point(|t| *t <= score);
        let lo = hi - 1;
        let (x0, x1) = (self.thresholds[lo], self.thresholds[hi]);
        let (y0, y1) = (self.values[lo], self.values[hi]);
        let t = (score - x0) / (x1 - x0);
        (y0 + t * (y1 - y0)).clamp(0.0, 1.0)
    }
}

/// Stratified fold assignment without shuffling
///
/// Class members keep their input order; per fold and class, the counts
/// match striding over the label-sorted sample, so folds stay balanced.
/// Returns the held-out indices of each fold.
pub fn stratified_folds(labels: &[u8], folds: usize) -> Result<Vec<Vec<usize>>> {
    if folds < 2 {
        return Err(RiskError::InvalidParameters(format!(
            "calibration needs at least 2 folds, got {}",
            folds
        )));
    }

    let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
    for (i, &label) in labels.iter().enumerate() {
        by_class[usize::from(label == 1)].push(i);
    }

    for (class, members) in by_class.iter().enumerate() {
        if members.len() < folds {
            return Err(RiskError::Training(format!(
                "class {} has {} members, fewer than {} calibration folds",
                class,
                members.len(),
                folds
            )));
        }
    }

    let mut assignment: Vec<Vec<usize>> = vec![Vec::new(); folds];
    let mut offset = 0;
    for members in &by_class {
        let mut cursor = members.iter();
        for (fold, held_out) in assignment.iter_mut().enumerate() {
            // Positions p in [offset, offset + n) with p % folds == fold
            let count = (offset..offset + members.len())
                .filter(|p| p % folds == fold)
                .count();
            held_out.extend(cursor.by_ref().take(count).copied());
        }
        offset += members.len();
    }

    for held_out in assignment.iter_mut() {
        held_out.sort_unstable();
    }
    Ok(assignment)
}

/// One fold's classifier and its calibration map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedMember {
    pub classifier: LogisticRegression,
    pub calibrator: IsotonicCalibrator,
}

impl CalibratedMember {
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        self.calibrator.calibrate(self.classifier.decision_function(row))
    }
}

/// Cross-fitted ensemble of calibrated logistic models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibratedClassifier {
    pub members: Vec<CalibratedMember>,
}

impl CalibratedClassifier {
    /// Probability above which `predict` returns 1
    pub const DECISION_THRESHOLD: f64 = 0.5;

    #[instrument(skip(x, y, config), fields(rows = x.len()))]
    pub fn fit(
        x: &[Vec<f64>],
        y: &[u8],
        folds: usize,
        config: &LogisticRegressionConfig,
    ) -> Result<Self> {
        if x.len() != y.len() {
            return Err(RiskError::Training(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }

        let assignment = stratified_folds(y, folds)?;
        let mut members = Vec::with_capacity(folds);

        for (fold, held_out) in assignment.iter().enumerate() {
            let mut is_held_out = vec![false; x.len()];
            for &i in held_out {
                is_held_out[i] = true;
            }

            let (train_x, train_y): (Vec<Vec<f64>>, Vec<u8>) = x
                .iter()
                .zip(y)
                .zip(&is_held_out)
                .filter(|(_, held)| !**held)
                .map(|((row, &label), _)| (row.clone(), label))
                .unzip();

            let classifier = LogisticRegression::fit(&train_x, &train_y, config)?;

            let scores: Vec<f64> = held_out.iter().map(|&i| classifier.decision_function(&x[i])).collect();
            let labels: Vec<u8> = held_out.iter().map(|&i| y[i]).collect();
            let calibrator = IsotonicCalibrator::fit(&scores, &labels)?;

            debug!(
                "Fold {}: trained on {} rows, calibrated on {} ({} knots)",
                fold + 1,
                train_y.len(),
                labels.len(),
                calibrator.thresholds.len()
            );
            members.push(CalibratedMember {
                classifier,
                calibrator,
            });
        }

        info!("Calibrated classifier fitted with {} folds", members.len());
        Ok(Self { members })
    }

    /// Mean calibrated positive-class probability
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.members.is_empty() {
            return 0.0;
        }
        let total: f64 = self.members.iter().map(|m| m.predict_proba(row)).sum();
        (total / self.members.len() as f64).clamp(0.0, 1.0)
    }

    /// Class label at the 0.5 probability cut
    pub fn predict(&self, row: &[f64]) -> u8 {
        u8::from(self.predict_proba(row) > Self::DECISION_THRESHOLD)
    }
}
