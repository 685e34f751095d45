//! Attach model probabilities and the business risk label to orders

use crate::errors::TrainerError;
use return_risk_core::{OrderTable, Value};
use tracing::info;

pub const PROBABILITY_COLUMN: &str = "pred_prob";
pub const LABEL_COLUMN: &str = "High_Risk_Label";

/// Boundary inclusive: a probability equal to the threshold is high risk
pub fn is_high_risk(probability: f64, threshold: f64) -> bool {
    probability >= threshold
}

/// Cleaned orders with `pred_prob` and `High_Risk_Label` appended
#[derive(Clone, Debug)]
pub struct ScoredOrders {
    pub table: OrderTable,
    pub probabilities: Vec<f64>,
    pub labels: Vec<u8>,
    pub threshold: f64,
}

/// Label every row of `table` with its probability and risk flag
pub fn score_orders(
    table: &OrderTable,
    probabilities: Vec<f64>,
    threshold: f64,
) -> Result<ScoredOrders, TrainerError> {
    if probabilities.len() != table.len() {
        return Err(TrainerError::Dataset(format!(
            "{} probabilities for {} rows",
            probabilities.len(),
            table.len()
        )));
    }
    if let Some(p) = probabilities.iter().find(|p| !(0.0..=1.0).contains(*p)) {
        return Err(TrainerError::Training(format!(
            "probability {} outside [0, 1]",
            p
        )));
    }

    let labels: Vec<u8> = probabilities
        .iter()
        .map(|&p| u8::from(is_high_risk(p, threshold)))
        .collect();

    let table = table
        .clone()
        .with_column(
            PROBABILITY_COLUMN,
            probabilities.iter().map(|&p| Value::Float(p)).collect(),
        )?
        .with_column(
            LABEL_COLUMN,
            labels.iter().map(|&l| Value::Int(i64::from(l))).collect(),
        )?;

    let flagged = labels.iter().filter(|&&l| l == 1).count();
    info!(
        "Scored {} orders, {} at or above threshold {}",
        table.len(),
        flagged,
        threshold
    );

    Ok(ScoredOrders {
        table,
        probabilities,
        labels,
        threshold,
    })
}

impl ScoredOrders {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn flagged(&self) -> usize {
        self.labels.iter().filter(|&&l| l == 1).count()
    }

    /// Row indices of high-risk orders, highest probability first
    pub fn high_risk_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.len()).filter(|&i| self.labels[i] == 1).collect();
        // sort_by is stable, so ties keep input order
        indices.sort_by(|&a, &b| self.probabilities[b].total_cmp(&self.probabilities[a]));
        indices
    }

    /// High-risk orders as a table, highest probability first
    pub fn high_risk(&self) -> OrderTable {
        self.table.select_rows(&self.high_risk_indices())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders(n: usize) -> OrderTable {
        let mut csv = String::from("Order_ID,Return_Flag\n");
        for i in 0..n {
            csv.push_str(&format!("{},0\n", i + 1));
        }
        OrderTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_threshold_boundary_is_inclusive() {
        assert!(is_high_risk(0.25, 0.25));
        assert!(!is_high_risk(0.2499999, 0.25));
        assert!(is_high_risk(1.0, 0.25));
    }

    #[test]
    fn test_score_orders_appends_columns() {
        let scored = score_orders(&orders(3), vec![0.1, 0.25, 0.9], 0.25).unwrap();
        assert_eq!(scored.labels, vec![0, 1, 1]);

        let headers = scored.table.headers();
        assert_eq!(&headers[headers.len() - 2..], &[PROBABILITY_COLUMN, LABEL_COLUMN]);
        assert_eq!(
            scored.table.column(LABEL_COLUMN).unwrap().values,
            vec![Value::Int(0), Value::Int(1), Value::Int(1)]
        );
    }

    #[test]
    fn test_high_risk_sorted_descending_with_stable_ties() {
        let scored = score_orders(&orders(5), vec![0.3, 0.8, 0.1, 0.3, 0.5], 0.25).unwrap();
        assert_eq!(scored.high_risk_indices(), vec![1, 4, 0, 3]);

        let high = scored.high_risk();
        assert_eq!(high.len(), 4);
        let ids: Vec<String> = high
            .column("Order_ID")
            .unwrap()
            .values
            .iter()
            .map(Value::render)
            .collect();
        assert_eq!(ids, vec!["2", "5", "1", "4"]);
    }

    #[test]
    fn test_length_mismatch_rejected() {
        assert!(matches!(
            score_orders(&orders(2), vec![0.5], 0.25),
            Err(TrainerError::Dataset(_))
        ));
    }

    #[test]
    fn test_out_of_range_probability_rejected() {
        assert!(score_orders(&orders(1), vec![1.5], 0.25).is_err());
    }
}
