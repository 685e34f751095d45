//! Write the scored outputs and the model artifact

use crate::artifact::save_model;
use crate::config::{HIGH_RISK_FILE, SCORED_FILE};
use crate::errors::TrainerError;
use crate::scoring::ScoredOrders;
use return_risk_core::ReturnRiskModel;
use std::path::{Path, PathBuf};
use tracing::info;

/// Files produced by one export
#[derive(Clone, Debug)]
pub struct ExportedArtifacts {
    pub high_risk_path: PathBuf,
    pub scored_path: PathBuf,
    pub model_path: PathBuf,
    pub hash_path: PathBuf,
    pub model_hash: String,
    pub high_risk_rows: usize,
    pub scored_rows: usize,
}

/// Write `high_risk_products.csv`, `scored_orders.csv` and the model
pub fn write_outputs(
    scored: &ScoredOrders,
    model: &ReturnRiskModel,
    output_dir: &Path,
) -> Result<ExportedArtifacts, TrainerError> {
    std::fs::create_dir_all(output_dir)?;

    let high_risk = scored.high_risk();
    let high_risk_path = output_dir.join(HIGH_RISK_FILE);
    high_risk.write_csv(&high_risk_path)?;
    info!(
        "Wrote {} high-risk orders to {}",
        high_risk.len(),
        high_risk_path.display()
    );

    let scored_path = output_dir.join(SCORED_FILE);
    scored.table.write_csv(&scored_path)?;
    info!("Wrote {} scored orders to {}", scored.len(), scored_path.display());

    let paths = save_model(model, output_dir)?;

    Ok(ExportedArtifacts {
        high_risk_path,
        scored_path,
        model_path: paths.model_path,
        hash_path: paths.hash_path,
        model_hash: paths.hash,
        high_risk_rows: high_risk.len(),
        scored_rows: scored.len(),
    })
}
