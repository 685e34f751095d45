//! Error types for the return-risk core

use crate::serde_canon::CanonicalError;
use thiserror::Error;

/// Errors that can occur while cleaning, preprocessing or fitting
#[derive(Error, Debug)]
pub enum RiskError {
    /// Required column missing or header malformed
    #[error("Schema error: {0}")]
    Schema(String),

    /// `Return_Flag` value that cannot be read as 0 or 1
    #[error("Invalid Return_Flag at row {row}: {value:?}")]
    InvalidLabel { row: usize, value: String },

    /// Feature layout differs from the one seen at fit time
    #[error("Feature mismatch: expected {expected} columns, got {actual}")]
    FeatureMismatch { expected: usize, actual: usize },

    /// Model fitting failed
    #[error("Training failed: {0}")]
    Training(String),

    /// Invalid model or optimizer parameters
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Canonical JSON error
    #[error("Canonical serialization error: {0}")]
    Canonical(#[from] CanonicalError),
}

/// Result type for return-risk core operations
pub type Result<T> = std::result::Result<T, RiskError>;
