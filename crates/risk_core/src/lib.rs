//! Return-risk core
//!
//! Cleans e-commerce order tables and fits a calibrated logistic model that
//! estimates the probability an order line will be returned.
//!
//! Modules:
//! - `schema`: Declared order fields and the per-table availability record
//! - `table`: Typed in-memory order table with CSV read/write
//! - `cleaning`: Deduplication, completeness filter and derived features
//! - `features`: Feature selection and raw feature extraction
//! - `preprocessing`: Standard scaling and one-hot encoding (fit / apply)
//! - `logistic`: L2 logistic regression with class weighting
//! - `calibration`: Isotonic calibration and cross-fitted classifier
//! - `model`: The return-risk model tying the above together
//! - `metrics`: ROC-AUC and classification report
//! - `serde_canon`: Canonical JSON and Blake3 hashing for artifacts

pub mod calibration;
pub mod cleaning;
pub mod errors;
pub mod features;
pub mod logistic;
pub mod metrics;
pub mod model;
pub mod preprocessing;
pub mod schema;
pub mod serde_canon;
pub mod table;

pub use calibration::{CalibratedClassifier, IsotonicCalibrator};
pub use cleaning::{clean, CleaningReport};
pub use errors::{Result, RiskError};
pub use features::{FeatureFrame, FeatureRow, FeatureSet};
pub use logistic::{ClassWeight, LogisticRegression, LogisticRegressionConfig};
pub use metrics::{roc_auc, ClassificationReport};
pub use model::{ModelMetadata, ModelOptions, ReturnRiskModel};
pub use preprocessing::{FittedPreprocessor, Matrix, Preprocessor};
pub use schema::{Field, LabelPolicy, Schema};
pub use table::{OrderTable, Value};

/// Crate version string recorded in model metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
