//! Pipeline configuration
//!
//! Defaults reproduce the reference run; a TOML file may override any field.

use crate::errors::TrainerError;
use return_risk_core::logistic::{ClassWeight, LogisticRegressionConfig};
use return_risk_core::model::ModelOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;

/// Probability at or above which an order is flagged for review
pub const RISK_THRESHOLD: f64 = 0.25;
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;
pub const DEFAULT_RANDOM_SEED: u64 = 42;
pub const DEFAULT_CALIBRATION_FOLDS: usize = 3;
pub const DEFAULT_MAX_ITER: usize = 200;
pub const DEFAULT_OUTPUT_DIR: &str = "output";

pub const HIGH_RISK_FILE: &str = "high_risk_products.csv";
pub const SCORED_FILE: &str = "scored_orders.csv";
pub const MODEL_FILE: &str = "return_risk_model.json";
pub const MODEL_HASH_FILE: &str = "return_risk_model.hash";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory receiving the CSV outputs and the model artifact
    pub output_dir: PathBuf,
    pub risk_threshold: f64,
    /// Share of rows held out for evaluation
    pub test_fraction: f64,
    pub random_seed: u64,
    pub calibration_folds: usize,
    pub max_iter: usize,
    /// Inverse L2 regularisation strength
    pub regularization: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            risk_threshold: RISK_THRESHOLD,
            test_fraction: DEFAULT_TEST_FRACTION,
            random_seed: DEFAULT_RANDOM_SEED,
            calibration_folds: DEFAULT_CALIBRATION_FOLDS,
            max_iter: DEFAULT_MAX_ITER,
            regularization: 1.0,
        }
    }
}

impl PipelineConfig {
    /// Load from a TOML file; absent keys keep their defaults
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, TrainerError> {
        info!("Loading configuration from: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: PipelineConfig = toml::from_str(&content)
            .map_err(|e| TrainerError::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), TrainerError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| TrainerError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), TrainerError> {
        if !(0.0..=1.0).contains(&self.risk_threshold) {
            return Err(TrainerError::Config(format!(
                "risk_threshold must be within [0, 1], got {}",
                self.risk_threshold
            )));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(TrainerError::Config(format!(
                "test_fraction must be within (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.calibration_folds < 2 {
            return Err(TrainerError::Config(format!(
                "calibration_folds must be at least 2, got {}",
                self.calibration_folds
            )));
        }
        if self.max_iter == 0 {
            return Err(TrainerError::Config("max_iter must be at least 1".into()));
        }
        if !(self.regularization.is_finite() && self.regularization > 0.0) {
            return Err(TrainerError::Config(format!(
                "regularization must be positive, got {}",
                self.regularization
            )));
        }
        Ok(())
    }

    /// Options handed to the model fit
    pub fn model_options(&self) -> ModelOptions {
        ModelOptions {
            calibration_folds: self.calibration_folds,
            logistic: LogisticRegressionConfig {
                c: self.regularization,
                max_iter: self.max_iter,
                class_weight: ClassWeight::Balanced,
                ..Default::default()
            },
            random_seed: self.random_seed,
        }
    }
}
