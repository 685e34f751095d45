//! End-to-end return-risk runs
//!
//! `run` trains a fresh model from an order file and exports everything;
//! `score_with_artifact` reuses a saved model on new orders.

use crate::artifact::load_model;
use crate::config::PipelineConfig;
use crate::dataset::{stratified_split, Dataset};
use crate::errors::TrainerError;
use crate::export::{write_outputs, ExportedArtifacts};
use crate::scoring::{score_orders, ScoredOrders};
use return_risk_core::{
    clean, roc_auc, ClassificationReport, CleaningReport, FeatureFrame, FeatureSet, LabelPolicy,
    OrderTable, ReturnRiskModel,
};
use std::path::Path;
use tracing::{info, instrument, warn};

/// Held-out performance of the fitted model
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// None when the test split holds a single class
    pub auc: Option<f64>,
    pub report: ClassificationReport,
    pub test_rows: usize,
}

/// Everything a training run produced
#[derive(Debug)]
pub struct PipelineOutcome {
    pub cleaning: CleaningReport,
    pub features: FeatureSet,
    pub train_rows: usize,
    pub evaluation: Evaluation,
    pub scored: ScoredOrders,
    pub artifacts: ExportedArtifacts,
}

/// Train on `input` and write every output into `config.output_dir`
#[instrument(skip_all, fields(input = %input.display()))]
pub fn run(input: &Path, config: &PipelineConfig) -> Result<PipelineOutcome, TrainerError> {
    config.validate()?;

    let raw = OrderTable::from_csv_path(input)?;
    info!("Loaded {} rows with {} columns", raw.len(), raw.width());

    let (table, cleaning) = clean(raw)?;
    if table.is_empty() {
        return Err(TrainerError::Dataset("no rows left after cleaning".into()));
    }

    let features = FeatureSet::select(table.schema());
    info!(
        "Selected {} numerical and {} categorical features",
        features.numerical.len(),
        features.categorical.len()
    );

    let dataset = Dataset::from_table(&table, &features)?;
    info!(
        "Dataset: {} rows, {} returned ({:.1}%)",
        dataset.len(),
        dataset.positives(),
        dataset.positives() as f64 * 100.0 / dataset.len() as f64
    );

    let split = stratified_split(&dataset.labels, config.test_fraction, config.random_seed)?;
    let train = dataset.subset(&split.train);
    let test = dataset.subset(&split.test);

    let model = ReturnRiskModel::fit(&train.frame, &train.labels, &config.model_options())?;
    let evaluation = evaluate(&model, &test)?;

    let probabilities = model.predict_proba(&dataset.frame)?;
    let scored = score_orders(&table, probabilities, config.risk_threshold)?;
    let artifacts = write_outputs(&scored, &model, &config.output_dir)?;

    info!(
        "Run complete: {} scored, {} high risk, model hash {}",
        artifacts.scored_rows, artifacts.high_risk_rows, artifacts.model_hash
    );

    Ok(PipelineOutcome {
        cleaning,
        features,
        train_rows: train.len(),
        evaluation,
        scored,
        artifacts,
    })
}

/// Score the held-out rows and log AUC plus the classification report
pub fn evaluate(model: &ReturnRiskModel, test: &Dataset) -> Result<Evaluation, TrainerError> {
    let probabilities = model.predict_proba(&test.frame)?;
    let predictions = model.predict(&test.frame)?;

    let auc = roc_auc(&test.labels, &probabilities);
    match auc {
        Some(auc) => info!("Test ROC-AUC: {:.4}", auc),
        None => warn!("Test split holds a single class; ROC-AUC undefined"),
    }

    let report = ClassificationReport::compute(&test.labels, &predictions);
    info!("Classification report:\n{}", report);

    Ok(Evaluation {
        auc,
        report,
        test_rows: test.len(),
    })
}

/// Score a new order file with a saved model and write the scored CSV
///
/// `Return_Flag` is optional here; orders without a label are scored too.
#[instrument(skip_all, fields(model = %model_path.display(), input = %input.display()))]
pub fn score_with_artifact(
    model_path: &Path,
    input: &Path,
    output: &Path,
    threshold: f64,
) -> Result<ScoredOrders, TrainerError> {
    if !(0.0..=1.0).contains(&threshold) {
        return Err(TrainerError::Config(format!(
            "risk_threshold must be within [0, 1], got {}",
            threshold
        )));
    }

    let model = load_model(model_path)?;
    let raw = OrderTable::from_csv_path_with(input, LabelPolicy::Optional)?;
    let (table, _) = clean(raw)?;
    if table.is_empty() {
        return Err(TrainerError::Dataset(format!(
            "no orders left to score in {} after cleaning",
            input.display()
        )));
    }

    let frame = FeatureFrame::extract(&table, model.features())?;
    let probabilities = model.predict_proba(&frame)?;
    let scored = score_orders(&table, probabilities, threshold)?;

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    scored.table.write_csv(output)?;
    info!("Wrote {} scored orders to {}", scored.len(), output.display());

    Ok(scored)
}
