//! Integration tests for the return-risk pipeline
//!
//! Runs the full train/score flow on synthetic order files.

use anyhow::Result;
use return_risk_core::{clean, FeatureSet, LabelPolicy, OrderTable, RiskError, Value};
use return_risk_trainer::config::{HIGH_RISK_FILE, MODEL_FILE, SCORED_FILE};
use return_risk_trainer::{
    load_model, pipeline, stratified_split, Dataset, PipelineConfig, TrainerError,
};
use std::io::Write;
use std::path::Path;
use tempfile::{NamedTempFile, TempDir};

const REGIONS: [&str; 3] = ["North", "South", "West"];

/// 100 orders, every fifth one returned
fn create_synthetic_orders() -> Result<NamedTempFile> {
    let mut file = NamedTempFile::new()?;
    writeln!(
        file,
        "Order_ID,Product_ID,Order_Date,Price,Quantity,Region,Delivery_Issue,Return_Flag"
    )?;

    for i in 0..100usize {
        let returned = i % 5 == 0;
        let price = if i == 3 {
            "abc".to_string()
        } else {
            (20 + (i * 37) % 100 + usize::from(returned) * 60).to_string()
        };
        let delivery_issue = if (returned && i % 10 == 0) || i % 7 == 0 {
            "Yes"
        } else {
            "No"
        };
        writeln!(
            file,
            "{},P{},2023-01-{:02},{},{},{},{},{}",
            1000 + i,
            i % 8,
            1 + i % 28,
            price,
            1 + i % 3,
            REGIONS[i % 3],
            delivery_issue,
            u8::from(returned)
        )?;
    }

    file.flush()?;
    Ok(file)
}

fn config_in(dir: &Path) -> PipelineConfig {
    PipelineConfig {
        output_dir: dir.to_path_buf(),
        ..Default::default()
    }
}

fn column_f64(table: &OrderTable, name: &str) -> Vec<f64> {
    table
        .column(name)
        .map(|c| c.values.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

#[test]
fn test_deterministic_auc_across_runs() -> Result<()> {
    let input = create_synthetic_orders()?;
    let first_dir = TempDir::new()?;
    let second_dir = TempDir::new()?;

    let first = pipeline::run(input.path(), &config_in(first_dir.path()))?;
    let second = pipeline::run(input.path(), &config_in(second_dir.path()))?;

    let auc1 = first.evaluation.auc.expect("both classes in test split");
    let auc2 = second.evaluation.auc.expect("both classes in test split");
    assert!((auc1 - auc2).abs() < 1e-12, "AUC differs: {} vs {}", auc1, auc2);
    assert_eq!(first.scored.probabilities, second.scored.probabilities);
    assert_eq!(first.evaluation.test_rows, 20);
    assert_eq!(first.train_rows, 80);
    Ok(())
}

#[test]
fn test_outputs_match_cleaned_rows() -> Result<()> {
    let input = create_synthetic_orders()?;
    let dir = TempDir::new()?;
    let outcome = pipeline::run(input.path(), &config_in(dir.path()))?;

    // The unparseable price is imputed, not dropped
    assert_eq!(outcome.cleaning.output_rows, 100);
    assert_eq!(outcome.cleaning.imputed_prices, 1);

    let scored = OrderTable::from_csv_path(dir.path().join(SCORED_FILE))?;
    assert_eq!(scored.len(), outcome.cleaning.output_rows);

    let probabilities = column_f64(&scored, "pred_prob");
    assert_eq!(probabilities.len(), 100);
    assert!(probabilities.iter().all(|p| (0.0..=1.0).contains(p)));

    let labels = column_f64(&scored, "High_Risk_Label");
    for (p, label) in probabilities.iter().zip(&labels) {
        assert_eq!(*label == 1.0, *p >= 0.25);
    }

    let high_risk = OrderTable::from_csv_path(dir.path().join(HIGH_RISK_FILE))?;
    let expected = outcome.scored.probabilities.iter().filter(|&&p| p >= 0.25).count();
    assert_eq!(high_risk.len(), expected);
    assert_eq!(outcome.artifacts.high_risk_rows, expected);

    let ranked = column_f64(&high_risk, "pred_prob");
    assert!(ranked.windows(2).all(|w| w[0] >= w[1]));
    Ok(())
}

#[test]
fn test_reloaded_artifact_scores_identically() -> Result<()> {
    let input = create_synthetic_orders()?;
    let dir = TempDir::new()?;
    let outcome = pipeline::run(input.path(), &config_in(dir.path()))?;

    let rescored_path = dir.path().join("rescored.csv");
    let rescored = pipeline::score_with_artifact(
        &dir.path().join(MODEL_FILE),
        input.path(),
        &rescored_path,
        0.25,
    )?;

    assert_eq!(rescored.probabilities, outcome.scored.probabilities);
    assert_eq!(rescored.labels, outcome.scored.labels);
    assert_eq!(OrderTable::from_csv_path(&rescored_path)?.len(), 100);
    Ok(())
}

#[test]
fn test_duplicates_and_incomplete_rows_removed() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "Order_ID,Product_ID,Price,Return_Flag")?;
    for i in 0..30 {
        writeln!(file, "{},P{},{},{}", i, i % 4, 10 + i * 3, u8::from(i % 3 == 0))?;
    }
    writeln!(file, "0,P0,10,1")?;
    writeln!(file, "99,,10,0")?;
    file.flush()?;

    let dir = TempDir::new()?;
    let outcome = pipeline::run(file.path(), &config_in(dir.path()))?;

    assert_eq!(outcome.cleaning.input_rows, 32);
    assert_eq!(outcome.cleaning.duplicates_removed, 1);
    assert_eq!(outcome.cleaning.incomplete_removed, 1);
    assert_eq!(outcome.artifacts.scored_rows, 30);
    Ok(())
}

#[test]
fn test_missing_return_flag_is_schema_error() -> Result<()> {
    let mut file = NamedTempFile::new()?;
    writeln!(file, "Order_ID,Product_ID,Price")?;
    writeln!(file, "1,P1,10")?;
    file.flush()?;

    let dir = TempDir::new()?;
    let result = pipeline::run(file.path(), &config_in(dir.path()));
    assert!(matches!(
        result,
        Err(TrainerError::Core(RiskError::Schema(_)))
    ));
    assert!(!dir.path().join(SCORED_FILE).exists());
    Ok(())
}

/// Column means of the numerical features, ignoring missing cells
fn numerical_means(dataset: &Dataset) -> Vec<f64> {
    let columns = dataset.frame.features.numerical.len();
    (0..columns)
        .map(|j| {
            let values: Vec<f64> = dataset
                .frame
                .rows
                .iter()
                .filter_map(|row| row.numerical[j])
                .collect();
            values.iter().sum::<f64>() / values.len() as f64
        })
        .collect()
}

#[test]
fn test_preprocessing_fitted_on_training_rows_only() -> Result<()> {
    let input = create_synthetic_orders()?;
    let dir = TempDir::new()?;
    let config = config_in(dir.path());
    pipeline::run(input.path(), &config)?;
    let model = load_model(&dir.path().join(MODEL_FILE))?;

    // Rebuild the same split the run used
    let (table, _) = clean(OrderTable::from_csv_path(input.path())?)?;
    let features = FeatureSet::select(table.schema());
    let dataset = Dataset::from_table(&table, &features)?;
    let split = stratified_split(&dataset.labels, config.test_fraction, config.random_seed)?;
    let train = dataset.subset(&split.train);

    let fitted = &model.preprocessor.scaler.means;
    let train_means = numerical_means(&train);
    let full_means = numerical_means(&dataset);

    assert_eq!(fitted.len(), train_means.len());
    for (fitted, expected) in fitted.iter().zip(&train_means) {
        assert!((fitted - expected).abs() < 1e-9, "{} vs {}", fitted, expected);
    }
    assert!(
        fitted.iter().zip(&full_means).any(|(a, b)| (a - b).abs() > 1e-9),
        "scaler means match the full dataset"
    );
    assert_eq!(model.metadata.training_rows, train.len());
    Ok(())
}

#[test]
fn test_scoring_unlabeled_orders() -> Result<()> {
    let input = create_synthetic_orders()?;
    let dir = TempDir::new()?;
    let outcome = pipeline::run(input.path(), &config_in(dir.path()))?;
    let model_path = dir.path().join(MODEL_FILE);

    // Same orders without the label column
    let mut no_label = NamedTempFile::new()?;
    // Same orders with the label left blank
    let mut blank_label = NamedTempFile::new()?;
    for (i, line) in std::fs::read_to_string(input.path())?.lines().enumerate() {
        let (orders, _) = line.rsplit_once(',').expect("label column");
        writeln!(no_label, "{}", orders)?;
        if i == 0 {
            writeln!(blank_label, "{}", line)?;
        } else {
            writeln!(blank_label, "{},", orders)?;
        }
    }
    no_label.flush()?;
    blank_label.flush()?;

    for file in [&no_label, &blank_label] {
        let output = dir.path().join("unlabeled_scored.csv");
        let scored = pipeline::score_with_artifact(&model_path, file.path(), &output, 0.25)?;
        assert_eq!(scored.len(), 100);
        assert_eq!(scored.probabilities, outcome.scored.probabilities);

        let written = OrderTable::from_csv_path_with(&output, LabelPolicy::Optional)?;
        assert_eq!(written.len(), 100);
    }
    Ok(())
}

#[test]
fn test_scoring_nothing_left_is_error() -> Result<()> {
    let input = create_synthetic_orders()?;
    let dir = TempDir::new()?;
    pipeline::run(input.path(), &config_in(dir.path()))?;

    let mut empty = NamedTempFile::new()?;
    writeln!(empty, "Order_ID,Product_ID,Price")?;
    writeln!(empty, ",P1,10")?;
    empty.flush()?;

    let output = dir.path().join("empty_scored.csv");
    let result = pipeline::score_with_artifact(&dir.path().join(MODEL_FILE), empty.path(), &output, 0.25);
    assert!(matches!(result, Err(TrainerError::Dataset(_))));
    assert!(!output.exists());
    Ok(())
}
