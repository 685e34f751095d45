//! Return-risk model: fitted preprocessing plus calibrated classifier
//!
//! The model knows how to fit and predict. Writing it to disk is handled by
//! the trainer's artifact module.

use crate::calibration::CalibratedClassifier;
use crate::errors::{Result, RiskError};
use crate::features::{FeatureFrame, FeatureSet};
use crate::logistic::LogisticRegressionConfig;
use crate::preprocessing::{FittedPreprocessor, Matrix, Preprocessor};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

/// Current artifact format version
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Fit-time options
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOptions {
    pub calibration_folds: usize,
    pub logistic: LogisticRegressionConfig,
    /// Recorded in metadata; the fit itself consumes no randomness
    pub random_seed: u64,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            calibration_folds: 3,
            logistic: LogisticRegressionConfig::default(),
            random_seed: 42,
        }
    }
}

/// Descriptive data carried alongside the fitted parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub version: u32,
    pub library_version: String,
    pub created_at: i64,
    pub features: FeatureSet,
    pub training_rows: usize,
    pub positive_rate: f64,
    pub calibration_folds: usize,
    pub random_seed: u64,
    pub logistic: LogisticRegressionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnRiskModel {
    pub metadata: ModelMetadata,
    pub preprocessor: FittedPreprocessor,
    pub classifier: CalibratedClassifier,
}

impl ReturnRiskModel {
    /// Fit preprocessing on the training frame, then the calibrated classifier
    #[instrument(skip(train, labels, options), fields(rows = train.len()))]
    pub fn fit(train: &FeatureFrame, labels: &[u8], options: &ModelOptions) -> Result<Self> {
        if train.len() != labels.len() {
            return Err(RiskError::Training(format!(
                "{} feature rows but {} labels",
                train.len(),
                labels.len()
            )));
        }
        if train.is_empty() {
            return Err(RiskError::Training("empty training set".into()));
        }

        let preprocessor = Preprocessor::fit(train);
        let x = preprocessor.apply(train)?;
        let classifier =
            CalibratedClassifier::fit(&x, labels, options.calibration_folds, &options.logistic)?;

        let positives = labels.iter().filter(|&&l| l == 1).count();
        let metadata = ModelMetadata {
            version: MODEL_FORMAT_VERSION,
            library_version: crate::VERSION.to_string(),
            created_at: chrono::Utc::now().timestamp(),
            features: train.features.clone(),
            training_rows: labels.len(),
            positive_rate: positives as f64 / labels.len() as f64,
            calibration_folds: options.calibration_folds,
            random_seed: options.random_seed,
            logistic: options.logistic.clone(),
        };

        info!(
            "Model fitted on {} rows ({:.1}% returned), {} input columns",
            metadata.training_rows,
            metadata.positive_rate * 100.0,
            preprocessor.output_width()
        );

        Ok(Self {
            metadata,
            preprocessor,
            classifier,
        })
    }

    pub fn features(&self) -> &FeatureSet {
        &self.metadata.features
    }

    fn transform(&self, frame: &FeatureFrame) -> Result<Matrix> {
        self.preprocessor.apply(frame)
    }

    /// Calibrated probability of return per row
    pub fn predict_proba(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        let x = self.transform(frame)?;
        Ok(x.iter().map(|row| self.classifier.predict_proba(row)).collect())
    }

    /// 0/1 class per row at the classifier's own 0.5 cut
    pub fn predict(&self, frame: &FeatureFrame) -> Result<Vec<u8>> {
        let x = self.transform(frame)?;
        Ok(x.iter().map(|row| self.classifier.predict(row)).collect())
    }

    /// Structural checks for a model read back from storage
    pub fn validate(&self) -> Result<()> {
        if self.metadata.version != MODEL_FORMAT_VERSION {
            return Err(RiskError::InvalidParameters(format!(
                "unsupported model version: {}",
                self.metadata.version
            )));
        }
        if self.preprocessor.features != self.metadata.features {
            return Err(RiskError::InvalidParameters(
                "preprocessor features differ from metadata".into(),
            ));
        }
        if self.classifier.members.is_empty() {
            return Err(RiskError::InvalidParameters("model has no calibrated members".into()));
        }

        let width = self.preprocessor.output_width();
        let scaler = &self.preprocessor.scaler;
        if scaler.means.len() != self.metadata.features.numerical.len()
            || scaler.scales.len() != scaler.means.len()
        {
            return Err(RiskError::InvalidParameters("scaler size mismatch".into()));
        }
        if scaler.scales.iter().any(|s| !(s.is_finite() && *s > 0.0)) {
            return Err(RiskError::InvalidParameters("scaler has non-positive scale".into()));
        }
        if self.preprocessor.encoder.categories.len() != self.metadata.features.categorical.len() {
            return Err(RiskError::InvalidParameters("encoder size mismatch".into()));
        }

        for (i, member) in self.classifier.members.iter().enumerate() {
            if member.classifier.coefficients.len() != width {
                return Err(RiskError::FeatureMismatch {
                    expected: width,
                    actual: member.classifier.coefficients.len(),
                });
            }
            let cal = &member.calibrator;
            if cal.thresholds.is_empty() || cal.thresholds.len() != cal.values.len() {
                return Err(RiskError::InvalidParameters(format!(
                    "member {} has a malformed calibration map",
                    i
                )));
            }
            if cal.values.windows(2).any(|w| w[0] > w[1])
                || cal.values.iter().any(|v| !(0.0..=1.0).contains(v))
            {
                return Err(RiskError::InvalidParameters(format!(
                    "member {} calibration map is not a monotone probability",
                    i
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureRow;
    use crate::schema::Field;

    fn frame(n: usize) -> (FeatureFrame, Vec<u8>) {
        let rows = (0..n)
            .map(|i| FeatureRow {
                numerical: vec![Some(i as f64)],
                categorical: vec![Some(if i % 2 == 0 { "A" } else { "B" }.to_string())],
            })
            .collect();
        let labels = (0..n).map(|i| u8::from(i % 4 == 0 || i > n * 3 / 4)).collect();
        (
            FeatureFrame {
                features: FeatureSet {
                    numerical: vec![Field::Price],
                    categorical: vec![Field::Region],
                },
                rows,
            },
            labels,
        )
    }

    #[test]
    fn test_fit_and_predict() {
        let (train, labels) = frame(40);
        let model = ReturnRiskModel::fit(&train, &labels, &ModelOptions::default()).unwrap();
        model.validate().unwrap();

        let proba = model.predict_proba(&train).unwrap();
        let predicted = model.predict(&train).unwrap();
        assert_eq!(proba.len(), 40);
        for (p, label) in proba.iter().zip(&predicted) {
            assert!((0.0..=1.0).contains(p));
            assert_eq!(*label, u8::from(*p > 0.5));
        }
        assert_eq!(model.metadata.training_rows, 40);
        assert_eq!(model.metadata.calibration_folds, 3);
    }

    #[test]
    fn test_label_length_mismatch() {
        let (train, labels) = frame(12);
        let err = ReturnRiskModel::fit(&train, &labels[..5], &ModelOptions::default()).unwrap_err();
        assert!(matches!(err, RiskError::Training(_)));
    }

    #[test]
    fn test_validate_detects_tampering() {
        let (train, labels) = frame(24);
        let mut model = ReturnRiskModel::fit(&train, &labels, &ModelOptions::default()).unwrap();
        model.classifier.members[0].classifier.coefficients.pop();
        assert!(model.validate().is_err());
    }
}
