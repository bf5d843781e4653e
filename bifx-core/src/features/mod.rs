//! Feature units: independent fear signals derived from the dataset bundle.
//!
//! Every unit implements `FeatureUnit`: it receives the whole bundle, looks up
//! only the sources it needs, and returns a series named after itself. When
//! its inputs are unavailable it returns an empty series, not an error.
//!
//! Units are registered explicitly in a `FeatureRegistry`; adding a new unit
//! means implementing the trait and registering it, nothing else.

pub mod correlation_breakdown;
pub mod matrix;
pub mod realized_vol;
pub mod registry;
pub mod sentiment_trends;
pub mod usdtry_shock;
pub mod cds_spike;
pub mod vix_level;

pub use cds_spike::CdsSpike;
pub use correlation_breakdown::CorrelationBreakdown;
pub use matrix::FeatureMatrix;
pub use realized_vol::RealizedVol;
pub use registry::{FeatureOutcome, FeatureRegistry, RegistryError};
pub use sentiment_trends::SentimentTrends;
pub use usdtry_shock::UsdTryShock;
pub use vix_level::VixLevel;

use crate::data::DatasetBundle;
use crate::series::{Series, SeriesError, TimeSeriesTable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a feature unit produced no usable output.
#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("source '{source_name}' has no '{column}' column")]
    MissingColumn { source_name: String, column: String },

    #[error("computation failed: {0}")]
    Computation(String),

    #[error("unit panicked: {0}")]
    Panicked(String),

    #[error("malformed output: {0}")]
    Shape(#[from] SeriesError),
}

/// A pluggable signal generator.
pub trait FeatureUnit: Send + Sync {
    /// Identifying name; becomes the column name in the feature matrix.
    fn name(&self) -> &str;

    /// Compute the signal over the full bundle.
    fn compute(&self, bundle: &DatasetBundle) -> Result<Series, FeatureError>;
}

/// Window lengths and registry behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub realized_vol_window: usize,
    pub usdtry_shock_window: usize,
    pub cds_spike_window: usize,
    pub sentiment_window: usize,
    pub correlation_window: usize,
    /// Columns whose missing fraction exceeds this are reported (not removed).
    pub missing_threshold: f64,
    /// Run units on the rayon pool instead of one after another.
    pub parallel: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            realized_vol_window: 20,
            usdtry_shock_window: 20,
            cds_spike_window: 60,
            sentiment_window: 30,
            correlation_window: 60,
            missing_threshold: 0.30,
            parallel: false,
        }
    }
}

/// Annualization factor for daily data.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// `Close` column of a source, or `MissingColumn`.
pub(crate) fn close_of(source: &str, table: &TimeSeriesTable) -> Result<Series, FeatureError> {
    table.close().ok_or_else(|| FeatureError::MissingColumn {
        source_name: source.to_string(),
        column: "Close".to_string(),
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::data::DatasetBundle;
    use crate::series::TimeSeriesTable;
    use chrono::NaiveDate;

    pub fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    pub fn close_table(closes: &[f64]) -> TimeSeriesTable {
        column_table("Close", closes)
    }

    pub fn column_table(column: &str, values: &[f64]) -> TimeSeriesTable {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, v)| (day(i), vec![Some(*v)]))
            .collect();
        TimeSeriesTable::from_rows(&[column], rows).unwrap()
    }

    pub fn bundle(entries: Vec<(&str, TimeSeriesTable)>) -> DatasetBundle {
        let mut bundle = DatasetBundle::new();
        for (name, table) in entries {
            bundle.insert(name, table);
        }
        bundle
    }
}
