//! Explicit feature registry.
//!
//! Units are registered by name at startup. `compute_all` runs every unit
//! against the same immutable bundle with per-unit isolation: an error, a
//! panic, or a malformed series only removes that unit's column.

use super::{
    CdsSpike, CorrelationBreakdown, FeatureConfig, FeatureError, FeatureMatrix, FeatureUnit,
    RealizedVol, SentimentTrends, UsdTryShock, VixLevel,
};
use crate::data::DatasetBundle;
use crate::series::Series;
use rayon::prelude::*;
use std::panic::{catch_unwind, AssertUnwindSafe};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("invalid feature name '{0}': use lowercase letters, digits and '_'")]
    InvalidName(String),

    #[error("feature '{0}' is already registered")]
    Duplicate(String),
}

/// Result of running one unit.
#[derive(Debug)]
pub enum FeatureOutcome {
    Computed { name: String, points: usize },
    Unavailable { name: String },
    Failed { name: String, error: FeatureError },
}

impl FeatureOutcome {
    pub fn name(&self) -> &str {
        match self {
            FeatureOutcome::Computed { name, .. }
            | FeatureOutcome::Unavailable { name }
            | FeatureOutcome::Failed { name, .. } => name,
        }
    }

    pub fn is_computed(&self) -> bool {
        matches!(self, FeatureOutcome::Computed { .. })
    }
}

pub struct FeatureRegistry {
    units: Vec<Box<dyn FeatureUnit>>,
    parallel: bool,
    missing_threshold: f64,
}

impl Default for FeatureRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FeatureRegistry {
    pub fn new() -> Self {
        Self {
            units: Vec::new(),
            parallel: false,
            missing_threshold: FeatureConfig::default().missing_threshold,
        }
    }

    /// The six built-in fear signals with windows from `config`.
    pub fn builtin(config: &FeatureConfig) -> Self {
        let units: Vec<Box<dyn FeatureUnit>> = vec![
            Box::new(RealizedVol::new(config.realized_vol_window)),
            Box::new(UsdTryShock::new(config.usdtry_shock_window)),
            Box::new(CdsSpike::new(config.cds_spike_window)),
            Box::new(SentimentTrends::new(config.sentiment_window)),
            Box::new(VixLevel),
            Box::new(CorrelationBreakdown::new(config.correlation_window)),
        ];
        Self {
            units,
            parallel: config.parallel,
            missing_threshold: config.missing_threshold,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn with_missing_threshold(mut self, threshold: f64) -> Self {
        self.missing_threshold = threshold;
        self
    }

    /// Add a unit. Names must be unique and look like `snake_case` identifiers.
    pub fn register(&mut self, unit: Box<dyn FeatureUnit>) -> Result<(), RegistryError> {
        let name = unit.name();
        if !valid_name(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.units.iter().any(|u| u.name() == name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.units.push(unit);
        Ok(())
    }

    pub fn names(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Run every unit and join the usable results into a matrix.
    pub fn compute_all(&self, bundle: &DatasetBundle) -> FeatureMatrix {
        self.compute_all_with_outcomes(bundle).0
    }

    /// Like `compute_all`, also returning what happened to each unit
    /// (in registration order).
    pub fn compute_all_with_outcomes(
        &self,
        bundle: &DatasetBundle,
    ) -> (FeatureMatrix, Vec<FeatureOutcome>) {
        log::info!("computing {} features", self.units.len());

        let results: Vec<Result<Series, FeatureError>> = if self.parallel {
            self.units
                .par_iter()
                .map(|unit| run_isolated(unit.as_ref(), bundle))
                .collect()
        } else {
            self.units
                .iter()
                .map(|unit| run_isolated(unit.as_ref(), bundle))
                .collect()
        };

        let mut series = Vec::new();
        let mut outcomes = Vec::with_capacity(results.len());
        for (unit, result) in self.units.iter().zip(results) {
            let name = unit.name().to_string();
            match result {
                Ok(s) if s.valid_count() > 0 => {
                    log::info!("computed feature {name}: {} values", s.valid_count());
                    outcomes.push(FeatureOutcome::Computed {
                        name,
                        points: s.valid_count(),
                    });
                    series.push(s);
                }
                Ok(_) => {
                    log::warn!("feature {name} returned no data");
                    outcomes.push(FeatureOutcome::Unavailable { name });
                }
                Err(error) => {
                    log::error!("error computing feature {name}: {error}");
                    outcomes.push(FeatureOutcome::Failed { name, error });
                }
            }
        }

        let matrix = FeatureMatrix::from_series(series);
        if matrix.is_empty() {
            log::error!("no features were successfully computed");
        } else {
            log::info!(
                "feature matrix: {} dates x {} features",
                matrix.len(),
                matrix.width()
            );
            for (name, frac) in matrix.sparse_columns(self.missing_threshold) {
                log::warn!(
                    "feature {name} has {:.1}% missing values (threshold {:.1}%)",
                    frac * 100.0,
                    self.missing_threshold * 100.0
                );
            }
        }
        (matrix, outcomes)
    }
}

/// Run one unit, turning panics and malformed output into errors.
///
/// The returned series is validated, carries the unit's name and has no
/// non-finite values.
pub fn run_isolated(unit: &dyn FeatureUnit, bundle: &DatasetBundle) -> Result<Series, FeatureError> {
    let series = catch_unwind(AssertUnwindSafe(|| unit.compute(bundle)))
        .map_err(|payload| FeatureError::Panicked(panic_message(payload.as_ref())))??;
    series.validate()?;
    Ok(series.sanitized().rename(unit.name()))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && name.chars().next().is_some_and(|c| c.is_ascii_lowercase())
}
