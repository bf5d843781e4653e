//! Index synthesizer: feature matrix in, bounded composite fear index out.
//!
//! Four steps, each usable on its own:
//! 1. `normalize`: robust per-column scaling onto `[min_value, max_value]`
//! 2. `aggregate`: weighted average with per-date weight reallocation
//! 3. `smoothing`: EMA over the raw composite
//! 4. final clip to `[min_value, max_value]`

pub mod aggregate;
pub mod normalize;
pub mod smoothing;

pub use aggregate::weighted_composite;
pub use normalize::{normalize_matrix, Exclusion, ExclusionReason, NormalizationMethod};
pub use smoothing::ema;

use crate::features::FeatureMatrix;
use crate::series::Series;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Column name of the final composite.
pub const INDEX_NAME: &str = "fear_index";

#[derive(Debug, Error, PartialEq)]
pub enum SynthesisError {
    #[error("feature matrix is empty")]
    EmptyMatrix,

    #[error("every feature was excluded during normalization ({0} columns)")]
    AllColumnsExcluded(usize),

    #[error("no weighted feature has a value on any date")]
    NoWeightedData,

    #[error("invalid index configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub normalization: NormalizationMethod,
    pub min_value: f64,
    pub max_value: f64,
    pub ema_span: usize,
    /// Feature name → relative weight. Need not sum to one.
    pub weights: BTreeMap<String, f64>,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            normalization: NormalizationMethod::RobustPercentile,
            min_value: 0.0,
            max_value: 100.0,
            ema_span: 5,
            weights: default_weights(),
        }
    }
}

impl IndexConfig {
    pub fn validate(&self) -> Result<(), SynthesisError> {
        if !(self.min_value.is_finite() && self.max_value.is_finite()) {
            return Err(SynthesisError::InvalidConfig("index range must be finite".into()));
        }
        if self.min_value >= self.max_value {
            return Err(SynthesisError::InvalidConfig(format!(
                "min_value {} must be below max_value {}",
                self.min_value, self.max_value
            )));
        }
        if self.ema_span == 0 {
            return Err(SynthesisError::InvalidConfig("ema_span must be at least 1".into()));
        }
        if let Some((name, w)) = self.weights.iter().find(|(_, w)| !w.is_finite() || **w < 0.0) {
            return Err(SynthesisError::InvalidConfig(format!(
                "weight for '{name}' must be a non-negative number, got {w}"
            )));
        }
        Ok(())
    }
}

/// Weights of the six built-in features.
pub fn default_weights() -> BTreeMap<String, f64> {
    [
        ("realized_vol", 0.25),
        ("usdtry_shock", 0.20),
        ("cds_spike", 0.20),
        ("sentiment_trends", 0.15),
        ("vix_level", 0.10),
        ("correlation_breakdown", 0.10),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

/// Every intermediate of one synthesis run.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub normalized: FeatureMatrix,
    pub excluded: Vec<Exclusion>,
    /// Weighted composite before smoothing, on the matrix date index.
    pub raw: Series,
    /// Smoothed and clipped composite; only dates with a value.
    pub index: Series,
}

/// Build the composite index.
pub fn synthesize(matrix: &FeatureMatrix, config: &IndexConfig) -> Result<Series, SynthesisError> {
    synthesize_detailed(matrix, config).map(|s| s.index)
}

/// Build the composite index, keeping the intermediates.
pub fn synthesize_detailed(
    matrix: &FeatureMatrix,
    config: &IndexConfig,
) -> Result<Synthesis, SynthesisError> {
    config.validate()?;
    if matrix.is_empty() {
        log::error!("cannot synthesize index from an empty feature matrix");
        return Err(SynthesisError::EmptyMatrix);
    }

    let (normalized, excluded) =
        normalize_matrix(matrix, config.normalization, config.min_value, config.max_value);
    if normalized.width() == 0 {
        log::error!("no features survived normalization");
        return Err(SynthesisError::AllColumnsExcluded(excluded.len()));
    }
    log::info!(
        "normalized {} features with {} ({} excluded)",
        normalized.width(),
        config.normalization,
        excluded.len()
    );

    let raw = weighted_composite(&normalized, &config.weights, INDEX_NAME);
    let (lo, hi) = (config.min_value, config.max_value);
    let index = ema(&raw, config.ema_span).map(|v| v.clamp(lo, hi));
    if index.is_empty() {
        log::error!("weighted aggregation produced no values");
        return Err(SynthesisError::NoWeightedData);
    }

    let values = index.valid_values();
    let avg = values.iter().sum::<f64>() / values.len() as f64;
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), v| (a.min(*v), b.max(*v)));
    log::info!(
        "fear index: {} points, mean {avg:.2}, min {min:.2}, max {max:.2}",
        index.len()
    );

    Ok(Synthesis {
        normalized,
        excluded,
        raw,
        index,
    })
}
