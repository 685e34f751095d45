//! Return-risk CLI
//!
//! Trains the calibrated return-risk model or scores new orders with a saved
//! artifact.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use return_risk_trainer::config::RISK_THRESHOLD;
use return_risk_trainer::{pipeline, PipelineConfig};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "return-risk")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Calibrated return-risk scoring for e-commerce orders", long_about = None)]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean, train, evaluate, score and export
    Train {
        /// Input CSV of order lines
        #[arg(short, long)]
        input: PathBuf,

        /// Output directory for the CSVs and the model artifact
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// TOML configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Probability at or above which an order is high risk
        #[arg(long)]
        threshold: Option<f64>,

        /// Seed for the train/test split
        #[arg(long)]
        seed: Option<u64>,

        /// Share of rows held out for evaluation
        #[arg(long)]
        test_fraction: Option<f64>,

        /// Calibration folds
        #[arg(long)]
        folds: Option<usize>,
    },

    /// Score a new order file with a saved model
    Score {
        /// Saved model JSON
        #[arg(short, long)]
        model: PathBuf,

        /// Input CSV of order lines
        #[arg(short, long)]
        input: PathBuf,

        /// Scored CSV to write
        #[arg(short, long)]
        output: PathBuf,

        /// Probability at or above which an order is high risk
        #[arg(long, default_value_t = RISK_THRESHOLD)]
        threshold: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Return-risk pipeline v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Train {
            input,
            output,
            config,
            threshold,
            seed,
            test_fraction,
            folds,
        } => {
            let mut pipeline_config = match config {
                Some(path) => PipelineConfig::load_from_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => PipelineConfig::default(),
            };
            if let Some(output) = output {
                pipeline_config.output_dir = output;
            }
            if let Some(threshold) = threshold {
                pipeline_config.risk_threshold = threshold;
            }
            if let Some(seed) = seed {
                pipeline_config.random_seed = seed;
            }
            if let Some(test_fraction) = test_fraction {
                pipeline_config.test_fraction = test_fraction;
            }
            if let Some(folds) = folds {
                pipeline_config.calibration_folds = folds;
            }

            info!("Training configuration:");
            info!("  Risk threshold: {}", pipeline_config.risk_threshold);
            info!("  Test fraction: {}", pipeline_config.test_fraction);
            info!("  Seed: {}", pipeline_config.random_seed);
            info!("  Calibration folds: {}", pipeline_config.calibration_folds);

            let outcome = pipeline::run(&input, &pipeline_config).context("Training run failed")?;

            info!("✓ Training completed successfully");
            match outcome.evaluation.auc {
                Some(auc) => info!("  ROC-AUC: {:.4}", auc),
                None => info!("  ROC-AUC: undefined"),
            }
            info!(
                "  High risk: {} ({} rows)",
                outcome.artifacts.high_risk_path.display(),
                outcome.artifacts.high_risk_rows
            );
            info!(
                "  Scored: {} ({} rows)",
                outcome.artifacts.scored_path.display(),
                outcome.artifacts.scored_rows
            );
            info!(
                "  Model: {} ({})",
                outcome.artifacts.model_path.display(),
                outcome.artifacts.model_hash
            );
        }
        Command::Score {
            model,
            input,
            output,
            threshold,
        } => {
            let scored = pipeline::score_with_artifact(&model, &input, &output, threshold)
                .context("Scoring failed")?;
            info!(
                "✓ Scored {} orders, {} high risk -> {}",
                scored.len(),
                scored.flagged(),
                output.display()
            );
        }
    }

    Ok(())
}
