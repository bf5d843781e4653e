//! Data acquisition: cache-first loading with per-source failure isolation.
//!
//! For each enabled source:
//! 1. If caching is on and the cache entry is younger than the validity
//!    window → return the cached table, no provider call.
//! 2. Otherwise dispatch on the provider kind to its adapter.
//! 3. On a non-empty result with caching on → overwrite the cache entry.
//!
//! Every adapter failure is logged with source, provider and reason and turned
//! into "unavailable". One source failing never stops the others. The search
//! interest keywords are loaded once, jointly, under `GoogleTrends`.

use super::alphavantage::AlphaVantageProvider;
use super::bundle::DatasetBundle;
use super::cache::CacheStore;
use super::catalog::{DateRange, ProviderKind, SourceCatalog, SourceDescriptor, SEARCH_INTEREST_SOURCE};
use super::http::HttpClient;
use super::manual::ManualFileProvider;
use super::provider::{Credentials, DataError, DataProvider, KeywordProvider};
use super::synthetic::SyntheticProvider;
use super::trends::GoogleTrendsProvider;
use super::yahoo::YahooProvider;
use crate::series::TimeSeriesTable;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// One adapter per provider kind.
pub struct ProviderSet {
    pub market: Box<dyn DataProvider>,
    pub fx: Box<dyn DataProvider>,
    pub alt_data: Box<dyn KeywordProvider>,
    pub manual: Box<dyn DataProvider>,
}

impl ProviderSet {
    /// Real network adapters plus the manual-file reader.
    pub fn live(
        manual_dir: impl Into<PathBuf>,
        credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self, DataError> {
        Ok(Self {
            market: Box::new(YahooProvider::new(HttpClient::new(timeout)?)),
            fx: Box::new(AlphaVantageProvider::new(
                HttpClient::new(timeout)?,
                credentials.alphavantage_key().map(String::from),
            )),
            alt_data: Box::new(GoogleTrendsProvider::new(HttpClient::new(timeout)?)),
            manual: Box::new(ManualFileProvider::new(manual_dir)),
        })
    }

    /// Seeded synthetic data for every network kind; manual files are still read.
    pub fn synthetic(seed: u64, manual_dir: impl Into<PathBuf>) -> Self {
        Self {
            market: Box::new(SyntheticProvider::new(seed)),
            fx: Box::new(SyntheticProvider::new(seed.wrapping_add(1))),
            alt_data: Box::new(SyntheticProvider::new(seed.wrapping_add(2))),
            manual: Box::new(ManualFileProvider::new(manual_dir)),
        }
    }

    fn provider_name(&self, kind: ProviderKind) -> &str {
        match kind {
            ProviderKind::MarketApi => self.market.name(),
            ProviderKind::FxApi => self.fx.name(),
            ProviderKind::AltDataApi => self.alt_data.name(),
            ProviderKind::ManualFile => self.manual.name(),
        }
    }

    /// Dispatch one source to the adapter for its provider kind.
    fn fetch(&self, source: &SourceDescriptor, range: &DateRange) -> Result<TimeSeriesTable, DataError> {
        match source.provider {
            ProviderKind::MarketApi => self.market.fetch(&source.symbol, range),
            ProviderKind::FxApi => self.fx.fetch(&source.symbol, range),
            ProviderKind::AltDataApi => self
                .alt_data
                .fetch_keywords(std::slice::from_ref(&source.symbol), range),
            ProviderKind::ManualFile => self.manual.fetch(&source.symbol, range),
        }
    }
}

/// Cache behaviour and the requested window.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub range: DateRange,
    pub use_cache: bool,
    pub cache_days_valid: u32,
}

/// Where a loaded table came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    Cache,
    Provider,
    Unavailable,
}

pub struct DataLoader {
    providers: ProviderSet,
    cache: CacheStore,
    options: LoaderOptions,
}

impl DataLoader {
    pub fn new(providers: ProviderSet, cache: CacheStore, options: LoaderOptions) -> Self {
        Self {
            providers,
            cache,
            options,
        }
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Load one source. Failures come back as an empty table.
    pub fn load_source(&self, source: &SourceDescriptor) -> TimeSeriesTable {
        self.load_source_traced(source).0
    }

    /// Like `load_source`, also reporting where the table came from.
    pub fn load_source_traced(&self, source: &SourceDescriptor) -> (TimeSeriesTable, LoadOrigin) {
        let provider = self.providers.provider_name(source.provider).to_string();
        self.load_cached_or(&source.name, &provider, || {
            self.providers.fetch(source, &self.options.range)
        })
    }

    /// Load the joint search-interest table for a keyword set.
    pub fn load_search_interest(&self, keywords: &[String]) -> TimeSeriesTable {
        if keywords.is_empty() {
            return TimeSeriesTable::empty();
        }
        let provider = self.providers.alt_data.name().to_string();
        self.load_cached_or(SEARCH_INTEREST_SOURCE, &provider, || {
            self.providers
                .alt_data
                .fetch_keywords(keywords, &self.options.range)
        })
        .0
    }

    /// Load every enabled source plus the search-interest keywords.
    ///
    /// The bundle only holds sources that produced data.
    pub fn load_all(&self, catalog: &SourceCatalog) -> DatasetBundle {
        log::info!("starting data load ({})", self.options.range);
        let mut bundle = DatasetBundle::new();

        for source in &catalog.sources {
            if !source.enabled {
                log::debug!("skipping disabled source: {}", source.name);
                continue;
            }
            let table = self.load_source(source);
            bundle.insert(source.name.clone(), table);
        }

        if !catalog.search_keywords.is_empty() {
            let table = self.load_search_interest(&catalog.search_keywords);
            bundle.insert(SEARCH_INTEREST_SOURCE, table);
        }

        log::info!("data load complete, sources loaded: {:?}", bundle.names());
        bundle
    }

    fn load_cached_or(
        &self,
        name: &str,
        provider: &str,
        fetch: impl FnOnce() -> Result<TimeSeriesTable, DataError>,
    ) -> (TimeSeriesTable, LoadOrigin) {
        let opts = &self.options;
        if opts.use_cache && self.cache.is_fresh(name, opts.cache_days_valid, SystemTime::now()) {
            match self.cache.load(name) {
                Ok(table) => {
                    log::info!("loading {name} from cache");
                    return (table, LoadOrigin::Cache);
                }
                Err(e) => log::warn!("cache entry for {name} unusable, refetching: {e}"),
            }
        }

        let table = match fetch() {
            Ok(table) if !table.is_empty() => table,
            Ok(_) => {
                log::warn!("{name} ({provider}): provider returned no rows");
                return (TimeSeriesTable::empty(), LoadOrigin::Unavailable);
            }
            Err(e) => {
                log_failure(name, provider, &e);
                return (TimeSeriesTable::empty(), LoadOrigin::Unavailable);
            }
        };

        if opts.use_cache {
            match self.cache.write(name, &table) {
                Ok(()) => log::info!("cached {name} to {}", self.cache.entry_path(name).display()),
                Err(e) => log::warn!("failed to cache {name}: {e}"),
            }
        }
        (table, LoadOrigin::Provider)
    }
}

/// Expected unavailability is a warning; anything else is an error.
fn log_failure(name: &str, provider: &str, err: &DataError) {
    match err {
        DataError::MissingCredential(_)
        | DataError::ManualFileMissing { .. }
        | DataError::EmptyResult { .. } => {
            log::warn!("{name} ({provider}) unavailable: {err}")
        }
        _ => log::error!("failed to load {name} ({provider}): {err}"),
    }
}
