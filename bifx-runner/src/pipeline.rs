//! Pipeline orchestration: acquisition → features → synthesis → backtest.
//!
//! Stages run strictly in order. Each stage either hands a usable result to
//! the next or the run stops with `PipelineError::Starved`, naming the stage.
//! Recovered failures inside a stage (one source, one feature) are logged by
//! the stage itself and never reach this level.

use bifx_core::data::{CacheStore, DataLoader, DatasetBundle, DateRange, ProviderSet};
use bifx_core::features::{FeatureOutcome, FeatureRegistry};
use bifx_core::index::{synthesize_detailed, Synthesis};
use std::fmt;
use thiserror::Error;

use crate::backtest::{evaluate, BacktestResult};
use crate::config::PipelineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Acquisition,
    Features,
    Synthesis,
    Backtest,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Acquisition => "acquisition",
            Stage::Features => "features",
            Stage::Synthesis => "synthesis",
            Stage::Backtest => "backtest",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum PipelineError {
    #[error("pipeline halted at {stage}: {cause}")]
    Starved { stage: Stage, cause: String },
}

impl PipelineError {
    fn starved(stage: Stage, cause: impl Into<String>) -> Self {
        let cause = cause.into();
        log::error!("pipeline halted at {stage}: {cause}");
        PipelineError::Starved { stage, cause }
    }

    pub fn stage(&self) -> Stage {
        match self {
            PipelineError::Starved { stage, .. } => *stage,
        }
    }
}

/// Everything a completed run produced.
#[derive(Debug)]
pub struct PipelineReport {
    pub range: DateRange,
    /// BLAKE3 over the acquired bundle.
    pub fingerprint: String,
    pub bundle: DatasetBundle,
    pub outcomes: Vec<FeatureOutcome>,
    pub synthesis: Synthesis,
    pub backtest: BacktestResult,
}

impl PipelineReport {
    /// Log the end-of-run summary.
    pub fn log_summary(&self) {
        let m = &self.backtest.metrics;
        log::info!("==== BIFX run summary ====");
        log::info!("data period: {} to {}", m.start_date, m.end_date);
        log::info!("observations: {}", m.observations);
        log::info!("dataset fingerprint: {}", self.fingerprint);
        log::info!("correlation (index vs next-day |return|): {:.4}", m.correlation);
        log::info!("ROC-AUC (crash prediction): {:.4}", m.roc_auc);
        log::info!("Sharpe market: {:.4}", m.sharpe_market);
        log::info!("Sharpe strategy: {:.4}", m.sharpe_strategy);
        log::info!("total return market: {:.2}%", m.total_return_market * 100.0);
        log::info!("total return strategy: {:.2}%", m.total_return_strategy * 100.0);
    }
}

/// Resolved configuration plus the loader and registry it drives.
pub struct Pipeline {
    config: PipelineConfig,
    loader: DataLoader,
    registry: FeatureRegistry,
}

impl Pipeline {
    /// Built-in feature units, cache under `config.cache_dir`.
    pub fn new(config: PipelineConfig, providers: ProviderSet) -> Self {
        let loader = DataLoader::new(
            providers,
            CacheStore::new(config.cache_dir.clone()),
            config.loader_options(),
        );
        let registry = FeatureRegistry::builtin(&config.features);
        Self {
            config,
            loader,
            registry,
        }
    }

    /// Replace the feature registry.
    pub fn with_registry(mut self, registry: FeatureRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn registry(&self) -> &FeatureRegistry {
        &self.registry
    }

    pub fn run(&self) -> Result<PipelineReport, PipelineError> {
        let cfg = &self.config;
        log::info!("starting BIFX pipeline for {}", cfg.range);

        // 1. Acquisition
        let bundle = self.loader.load_all(&cfg.catalog);
        if bundle.is_starved() {
            return Err(PipelineError::starved(
                Stage::Acquisition,
                "no source returned any data",
            ));
        }
        let fingerprint = bundle.fingerprint();
        log::info!(
            "acquired {} sources: {}",
            bundle.len(),
            bundle.names().join(", ")
        );

        // 2. Features
        let (matrix, outcomes) = self.registry.compute_all_with_outcomes(&bundle);
        if matrix.is_empty() {
            return Err(PipelineError::starved(
                Stage::Features,
                "no feature unit produced data",
            ));
        }

        // 3. Synthesis
        let synthesis = synthesize_detailed(&matrix, &cfg.index)
            .map_err(|e| PipelineError::starved(Stage::Synthesis, e.to_string()))?;

        // 4. Backtest
        let reference = &cfg.backtest.reference_source;
        let close = bundle
            .get(reference)
            .and_then(|t| t.close())
            .filter(|s| s.valid_count() > 0)
            .ok_or_else(|| {
                PipelineError::starved(
                    Stage::Backtest,
                    format!("reference source '{reference}' has no close prices"),
                )
            })?;
        let backtest = evaluate(&synthesis.index, &close, &cfg.backtest)
            .map_err(|e| PipelineError::starved(Stage::Backtest, e.to_string()))?;

        Ok(PipelineReport {
            range: cfg.range,
            fingerprint,
            bundle,
            outcomes,
            synthesis,
            backtest,
        })
    }
}

/// Build and run a pipeline with the built-in feature units.
pub fn run_pipeline(
    config: PipelineConfig,
    providers: ProviderSet,
) -> Result<PipelineReport, PipelineError> {
    Pipeline::new(config, providers).run()
}
