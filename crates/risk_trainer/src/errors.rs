use return_risk_core::RiskError;
use thiserror::Error;

/// Errors returned by the return-risk trainer.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error(transparent)]
    Core(#[from] RiskError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
