//! BIFX Runner: configuration, orchestration, backtest evaluation and export.
//!
//! This crate builds on `bifx-core` to provide:
//! - TOML pipeline configuration resolved once into immutable settings
//! - Stage-by-stage orchestration with starvation reporting
//! - Backtest evaluator (rank correlation, crash ROC-AUC, exposure overlay)
//! - Artifact export (index CSV, metrics JSON, analysis CSV)

pub mod backtest;
pub mod config;
pub mod export;
pub mod metrics;
pub mod pipeline;

pub use backtest::{
    evaluate, exposure, AnalysisRow, BacktestConfig, BacktestError, BacktestMetrics,
    BacktestResult,
};
pub use config::{ConfigError, ConfigFile, PipelineConfig};
pub use export::save_artifacts;
pub use pipeline::{run_pipeline, Pipeline, PipelineError, PipelineReport, Stage};
