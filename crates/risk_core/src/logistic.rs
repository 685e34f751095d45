//! Binary logistic regression with L2 penalty
//!
//! Minimises the weighted mean log-loss plus `||w||² / (2·C·Σweights)`,
//! which has the same optimum as `C · Σ wᵢ·lossᵢ + ||w||² / 2`. The intercept
//! is not penalised. Optimisation uses L-BFGS with Armijo backtracking, so a
//! fit is fully deterministic for a given input.

use crate::errors::{Result, RiskError};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{debug, warn};

const LBFGS_MEMORY: usize = 10;
const ARMIJO_C1: f64 = 1e-4;
const MAX_LINE_SEARCH_STEPS: usize = 60;

/// How to weight the two classes in the loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// Every sample counts once
    Uniform,
    /// Class c weighted by `n / (2 · n_c)`
    #[default]
    Balanced,
}

/// Optimiser settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegressionConfig {
    /// Inverse regularisation strength
    pub c: f64,
    pub max_iter: usize,
    /// Stop when the largest gradient component falls below this
    pub tolerance: f64,
    pub class_weight: ClassWeight,
}

impl Default for LogisticRegressionConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 200,
            tolerance: 1e-4,
            class_weight: ClassWeight::Balanced,
        }
    }
}

impl LogisticRegressionConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err(RiskError::InvalidParameters(format!("C must be positive, got {}", self.c)));
        }
        if self.max_iter == 0 {
            return Err(RiskError::InvalidParameters("max_iter must be at least 1".into()));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(RiskError::InvalidParameters(format!(
                "tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }
}

/// Fitted linear classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
    pub iterations: usize,
    pub converged: bool,
}

impl LogisticRegression {
    /// Fit on a dense matrix and 0/1 labels
    pub fn fit(x: &[Vec<f64>], y: &[u8], config: &LogisticRegressionConfig) -> Result<Self> {
        config.validate()?;
        if x.len() != y.len() {
            return Err(RiskError::Training(format!(
                "{} rows but {} labels",
                x.len(),
                y.len()
            )));
        }
        if x.is_empty() {
            return Err(RiskError::Training("no training rows".into()));
        }
        let dims = x[0].len();
        if x.iter().any(|row| row.len() != dims) {
            return Err(RiskError::Training("ragged design matrix".into()));
        }

        let positives = y.iter().filter(|&&l| l == 1).count();
        let negatives = y.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(RiskError::Training(
                "logistic regression needs both classes in the training data".into(),
            ));
        }

        let weights = sample_weights(y, positives, negatives, config.class_weight);
        let objective = Objective {
            x,
            y,
            weights: &weights,
            total_weight: weights.iter().sum(),
            penalty: 1.0 / config.c,
        };

        let (theta, iterations, converged) = minimize_lbfgs(&objective, dims + 1, config);
        if !converged {
            warn!(
                "Logistic regression did not converge in {} iterations",
                config.max_iter
            );
        }
        debug!("Logistic regression fitted in {} iterations", iterations);

        Ok(Self {
            coefficients: theta[..dims].to_vec(),
            intercept: theta[dims],
            iterations,
            converged,
        })
    }

    /// Raw linear score `w·x + b`
    pub fn decision_function(&self, row: &[f64]) -> f64 {
        dot(&self.coefficients, row) + self.intercept
    }

    /// Uncalibrated positive-class probability
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.decision_function(row))
    }
}

fn sample_weights(y: &[u8], positives: usize, negatives: usize, mode: ClassWeight) -> Vec<f64> {
    let n = y.len() as f64;
    let (w_neg, w_pos) = match mode {
        ClassWeight::Uniform => (1.0, 1.0),
        ClassWeight::Balanced => (n / (2.0 * negatives as f64), n / (2.0 * positives as f64)),
    };
    y.iter().map(|&l| if l == 1 { w_pos } else { w_neg }).collect()
}

struct Objective<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    weights: &'a [f64],
    total_weight: f64,
    penalty: f64,
}

impl Objective<'_> {
    /// Loss and gradient at `theta = [w..., b]`
    fn evaluate(&self, theta: &[f64]) -> (f64, Vec<f64>) {
        let dims = theta.len() - 1;
        let (w, b) = theta.split_at(dims);
        let mut loss = 0.0;
        let mut grad = vec![0.0; theta.len()];

        for ((row, &label), &weight) in self.x.iter().zip(self.y).zip(self.weights) {
            let z = dot(w, row) + b[0];
            let target = label as f64;
            loss += weight * (softplus(z) - target * z);

            let residual = weight * (sigmoid(z) - target);
            for (g, xi) in grad[..dims].iter_mut().zip(row) {
                *g += residual * xi;
            }
            grad[dims] += residual;
        }

        let scale = 1.0 / self.total_weight;
        loss *= scale;
        for g in grad.iter_mut() {
            *g *= scale;
        }

        let reg = self.penalty * scale;
        loss += 0.5 * reg * dot(w, w);
        for (g, wi) in grad[..dims].iter_mut().zip(w) {
            *g += reg * wi;
        }

        (loss, grad)
    }
}

/// Returns (theta, iterations, converged)
fn minimize_lbfgs(
    objective: &Objective<'_>,
    size: usize,
    config: &LogisticRegressionConfig,
) -> (Vec<f64>, usize, bool) {
    let mut theta = vec![0.0; size];
    let (mut loss, mut grad) = objective.evaluate(&theta);
    let mut history: VecDeque<(Vec<f64>, Vec<f64>, f64)> = VecDeque::with_capacity(LBFGS_MEMORY);

    for iter in 0..config.max_iter {
        if max_abs(&grad) < config.tolerance {
            return (theta, iter, true);
        }

        let mut direction = two_loop_direction(&grad, &history);
        let mut slope = dot(&grad, &direction);
        if slope >= 0.0 {
            // Not a descent direction; restart from steepest descent
            history.clear();
            direction = grad.iter().map(|g| -g).collect();
            slope = -dot(&grad, &grad);
        }

        let mut step = if history.is_empty() {
            (1.0 / norm(&grad)).min(1.0)
        } else {
            1.0
        };

        let mut accepted = None;
        for _ in 0..MAX_LINE_SEARCH_STEPS {
            let candidate: Vec<f64> = theta
                .iter()
                .zip(&direction)
                .map(|(t, d)| t + step * d)
                .collect();
            let (candidate_loss, candidate_grad) = objective.evaluate(&candidate);
            if candidate_loss <= loss + ARMIJO_C1 * step * slope {
                accepted = Some((candidate, candidate_loss, candidate_grad));
                break;
            }
            step *= 0.5;
        }

        let Some((next, next_loss, next_grad)) = accepted else {
            // No progress possible along any step; treat as converged
            return (theta, iter, max_abs(&grad) < config.tolerance.sqrt());
        };

        let s: Vec<f64> = next.iter().zip(&theta).map(|(a, b)| a - b).collect();
        let y: Vec<f64> = next_grad.iter().zip(&grad).map(|(a, b)| a - b).collect();
        let sy = dot(&s, &y);
        if sy > 1e-12 {
            if history.len() == LBFGS_MEMORY {
                history.pop_front();
            }
            history.push_back((s, y, 1.0 / sy));
        }

        theta = next;
        loss = next_loss;
        grad = next_grad;
    }

    let converged = max_abs(&grad) < config.tolerance;
    (theta, config.max_iter, converged)
}

/// L-BFGS two-loop recursion: approximates `-H⁻¹·g`
fn two_loop_direction(grad: &[f64], history: &VecDeque<(Vec<f64>, Vec<f64>, f64)>) -> Vec<f64> {
    let mut q = grad.to_vec();
    let mut alphas = Vec::with_capacity(history.len());

    for (s, y, rho) in history.iter().rev() {
        let alpha = rho * dot(s, &q);
        for (qi, yi) in q.iter_mut().zip(y) {
            *qi -= alpha * yi;
        }
        alphas.push(alpha);
    }

    if let Some((s, y, _)) = history.back() {
        let gamma = dot(s, y) / dot(y, y);
        for qi in q.iter_mut() {
            *qi *= gamma;
        }
    }

    for ((s, y, rho), alpha) in history.iter().zip(alphas.iter().rev()) {
        let beta = rho * dot(y, &q);
        for (qi, si) in q.iter_mut().zip(s) {
            *qi += (alpha - beta) * si;
        }
    }

    q.iter().map(|v| -v).collect()
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + eᶻ)` without overflow
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn norm(v: &[f64]) -> f64 {
    dot(v, v).sqrt()
}

fn max_abs(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |m, x| m.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let x = vec![
            vec![-2.0],
            vec![-1.5],
            vec![-1.0],
            vec![-0.5],
            vec![0.5],
            vec![1.0],
            vec![1.5],
            vec![2.0],
        ];
        let y = vec![0, 0, 0, 1, 0, 1, 1, 1];
        (x, y)
    }

    #[test]
    fn test_sigmoid_is_stable() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(800.0) <= 1.0);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!((softplus(0.0) - 2f64.ln()).abs() < 1e-12);
        assert!(softplus(1000.0).is_finite());
    }

    #[test]
    fn test_fit_learns_positive_slope() {
        let (x, y) = separable();
        let model = LogisticRegression::fit(&x, &y, &LogisticRegressionConfig::default()).unwrap();
        assert!(model.converged);
        assert!(model.coefficients[0] > 0.0);
        assert!(model.predict_proba(&[2.0]) > 0.5);
        assert!(model.predict_proba(&[-2.0]) < 0.5);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = separable();
        let config = LogisticRegressionConfig::default();
        let a = LogisticRegression::fit(&x, &y, &config).unwrap();
        let b = LogisticRegression::fit(&x, &y, &config).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_balanced_weights_shift_intercept_towards_minority() {
        let x = vec![vec![0.0]; 10];
        let y = vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0];
        let uniform = LogisticRegressionConfig {
            class_weight: ClassWeight::Uniform,
            ..Default::default()
        };
        let plain = LogisticRegression::fit(&x, &y, &uniform).unwrap();
        let balanced = LogisticRegression::fit(&x, &y, &LogisticRegressionConfig::default()).unwrap();

        // Unweighted intercept approaches logit(0.1); balanced approaches 0
        assert!(plain.predict_proba(&[0.0]) < 0.2);
        assert!((balanced.predict_proba(&[0.0]) - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_single_class_rejected() {
        let x = vec![vec![1.0], vec![2.0]];
        let err = LogisticRegression::fit(&x, &[1, 1], &LogisticRegressionConfig::default()).unwrap_err();
        assert!(matches!(err, RiskError::Training(_)));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = LogisticRegressionConfig {
            c: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
