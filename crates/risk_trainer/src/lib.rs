//! Return-risk trainer - offline training, scoring and export
//!
//! Drives the core library over an order file: cleaning, a reproducible
//! stratified split, calibrated model fitting, held-out evaluation, scoring
//! of every order and export of the CSVs plus a hashed model artifact.

pub mod artifact;
pub mod config;
pub mod dataset;
pub mod deterministic;
pub mod errors;
pub mod export;
pub mod pipeline;
pub mod scoring;

pub use artifact::{load_model, save_model, ArtifactPaths};
pub use config::PipelineConfig;
pub use dataset::{stratified_split, Dataset, Split};
pub use deterministic::LcgRng;
pub use errors::TrainerError;
pub use export::{write_outputs, ExportedArtifacts};
pub use pipeline::{run, score_with_artifact, Evaluation, PipelineOutcome};
pub use scoring::{is_high_risk, score_orders, ScoredOrders};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
