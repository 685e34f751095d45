//! Hold-out evaluation metrics

use serde::{Deserialize, Serialize};
use std::fmt;

/// Area under the ROC curve
///
/// Rank-based (Mann-Whitney) with average ranks for tied scores. `None` when
/// the labels hold a single class or the lengths differ.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() {
        return None;
    }
    let positives = labels.iter().filter(|&&l| l == 1).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; tied block [start, end) shares the mean rank
        let rank = (start + end + 1) as f64 / 2.0;
        let tied_positives = order[start..end].iter().filter(|&&i| labels[i] == 1).count();
        positive_rank_sum += rank * tied_positives as f64;
        start = end;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Precision / recall / F1 for one class
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class metrics plus accuracy and averages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    /// Index 0 = not returned, 1 = returned
    pub classes: [ClassMetrics; 2],
    pub accuracy: f64,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
}

impl ClassificationReport {
    pub fn compute(y_true: &[u8], y_pred: &[u8]) -> Self {
        let total = y_true.len().min(y_pred.len());
        let pairs = || y_true.iter().zip(y_pred).take(total);

        let classes = [0u8, 1u8].map(|class| {
            let tp = pairs().filter(|(t, p)| **t == class && **p == class).count() as f64;
            let predicted = pairs().filter(|(_, p)| **p == class).count() as f64;
            let support = pairs().filter(|(t, _)| **t == class).count();

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support as f64);
            ClassMetrics {
                precision,
                recall,
                f1: ratio(2.0 * precision * recall, precision + recall),
                support,
            }
        });

        let correct = pairs().filter(|(t, p)| t == p).count() as f64;
        let macro_avg = ClassMetrics {
            precision: (classes[0].precision + classes[1].precision) / 2.0,
            recall: (classes[0].recall + classes[1].recall) / 2.0,
            f1: (classes[0].f1 + classes[1].f1) / 2.0,
            support: total,
        };
        let weighted = |metric: fn(&ClassMetrics) -> f64| {
            ratio(
                classes.iter().map(|c| metric(c) * c.support as f64).sum(),
                total as f64,
            )
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: total,
        };

        Self {
            classes,
            accuracy: ratio(correct, total as f64),
            macro_avg,
            weighted_avg,
        }
    }
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        for (class, m) in self.classes.iter().enumerate() {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(
            f,
            "{:>14} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        for (name, m) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        Ok(())
    }
}
