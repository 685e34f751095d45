//! Model artifact persistence
//!
//! The model is written as canonical JSON next to a BLAKE3 hash sidecar.
//! Loading re-hashes the JSON and refuses a file that no longer matches.

use crate::config::{MODEL_FILE, MODEL_HASH_FILE};
use crate::errors::TrainerError;
use return_risk_core::serde_canon::{hash_json_hex, to_canonical_json};
use return_risk_core::{ReturnRiskModel, RiskError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where a saved model landed
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub model_path: PathBuf,
    pub hash_path: PathBuf,
    pub hash: String,
}

/// Save the model as canonical JSON plus its hash in `dir`
pub fn save_model(model: &ReturnRiskModel, dir: &Path) -> Result<ArtifactPaths, TrainerError> {
    std::fs::create_dir_all(dir)?;

    let canonical_json = to_canonical_json(model).map_err(RiskError::from)?;
    let hash = hash_json_hex(&canonical_json);

    let model_path = dir.join(MODEL_FILE);
    info!("Saving model to: {}", model_path.display());
    std::fs::write(&model_path, &canonical_json)?;

    let hash_path = dir.join(MODEL_HASH_FILE);
    debug!("Saving hash to: {}", hash_path.display());
    std::fs::write(&hash_path, &hash)?;

    Ok(ArtifactPaths {
        model_path,
        hash_path,
        hash,
    })
}

/// Sidecar hash path for a model file
pub fn hash_path_for(model_path: &Path) -> PathBuf {
    model_path.with_file_name(MODEL_HASH_FILE)
}

/// Load a model, verifying the sidecar hash when one exists
pub fn load_model(model_path: &Path) -> Result<ReturnRiskModel, TrainerError> {
    info!("Loading model from: {}", model_path.display());
    let json = std::fs::read_to_string(model_path)?;

    let hash_path = hash_path_for(model_path);
    if hash_path.exists() {
        let expected = std::fs::read_to_string(&hash_path)?;
        let actual = hash_json_hex(&json);
        if expected.trim() != actual {
            return Err(TrainerError::Artifact(format!(
                "hash mismatch for {}: expected {}, got {}",
                model_path.display(),
                expected.trim(),
                actual
            )));
        }
        debug!("Model hash verified: {}", actual);
    } else {
        warn!(
            "No hash file next to {}, skipping verification",
            model_path.display()
        );
    }

    let model: ReturnRiskModel = serde_json::from_str(&json)
        .map_err(|e| TrainerError::Artifact(format!("failed to parse model: {}", e)))?;
    model.validate()?;

    info!(
        "Loaded model v{} trained on {} rows",
        model.metadata.version, model.metadata.training_rows
    );
    Ok(model)
}
