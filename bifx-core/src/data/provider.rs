//! Provider traits and structured error types.
//!
//! `DataProvider` abstracts over the per-symbol sources (market API, FX API,
//! manual files, synthetic data) so implementations can be swapped and mocked
//! in tests. `KeywordProvider` covers the search-interest source, which is
//! requested once for a whole keyword set. The cache sits above both traits:
//! providers don't know about the cache.

use super::catalog::DateRange;
use crate::series::{SeriesError, TimeSeriesTable};
use thiserror::Error;

/// Structured error types for acquisition and cache operations.
///
/// Every variant is recoverable at the loader boundary: the source is logged
/// and treated as unavailable.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("provider rejected request: {0}")]
    ProviderMessage(String),

    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("no data returned for '{symbol}'")]
    EmptyResult { symbol: String },

    #[error("manual data file not found: {path}")]
    ManualFileMissing { path: String },

    #[error("contract violation: {0}")]
    ContractViolation(String),

    #[error("cache error: {0}")]
    CacheError(String),

    #[error("parquet I/O error: {0}")]
    ParquetError(String),

    #[error("shape error: {0}")]
    Shape(#[from] SeriesError),

    #[error("data error: {0}")]
    Other(String),
}

/// Per-symbol data provider.
pub trait DataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the table for one symbol over a date range.
    ///
    /// An empty result is an error (`EmptyResult`), not an empty table.
    fn fetch(&self, symbol: &str, range: &DateRange) -> Result<TimeSeriesTable, DataError>;
}

/// Provider that answers one request for a whole keyword set.
pub trait KeywordProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch one column per keyword over a date range.
    fn fetch_keywords(
        &self,
        keywords: &[String],
        range: &DateRange,
    ) -> Result<TimeSeriesTable, DataError>;
}

/// API credentials, resolved by the caller (the core never reads the environment).
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub alphavantage: Option<String>,
}

impl Credentials {
    /// Treats blank strings as absent.
    pub fn alphavantage_key(&self) -> Option<&str> {
        self.alphavantage
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}
