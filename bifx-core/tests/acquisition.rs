//! Integration tests for cache-first acquisition and failure downgrade.

use bifx_core::data::{
    CacheStore, Credentials, DataError, DataLoader, DataProvider, DateRange, KeywordProvider,
    LoadOrigin, LoaderOptions, ProviderKind, ProviderSet, SourceCatalog, SourceDescriptor,
    SyntheticProvider, SEARCH_INTEREST_SOURCE,
};
use bifx_core::TimeSeriesTable;
use chrono::NaiveDate;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 6, 30).unwrap(),
    )
}

fn options(use_cache: bool) -> LoaderOptions {
    LoaderOptions {
        range: range(),
        use_cache,
        cache_days_valid: 1,
    }
}

/// Synthetic market data that counts how often it is asked.
struct Counting {
    inner: SyntheticProvider,
    calls: Arc<AtomicUsize>,
}

impl DataProvider for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn fetch(&self, symbol: &str, range: &DateRange) -> Result<TimeSeriesTable, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.market_table(symbol, range)
    }
}

impl KeywordProvider for Counting {
    fn name(&self) -> &str {
        "counting"
    }

    fn fetch_keywords(
        &self,
        keywords: &[String],
        range: &DateRange,
    ) -> Result<TimeSeriesTable, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.keyword_table(keywords, range)
    }
}

/// Always fails, like an unreachable network.
struct Offline;

impl DataProvider for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    fn fetch(&self, _symbol: &str, _range: &DateRange) -> Result<TimeSeriesTable, DataError> {
        Err(DataError::NetworkUnreachable("connection refused".into()))
    }
}

impl KeywordProvider for Offline {
    fn name(&self) -> &str {
        "offline"
    }

    fn fetch_keywords(
        &self,
        _keywords: &[String],
        _range: &DateRange,
    ) -> Result<TimeSeriesTable, DataError> {
        Err(DataError::RateLimited {
            retry_after_secs: 60,
        })
    }
}

fn counting_set(calls: &Arc<AtomicUsize>, manual_dir: &std::path::Path) -> ProviderSet {
    ProviderSet {
        market: Box::new(Counting {
            inner: SyntheticProvider::new(1),
            calls: Arc::clone(calls),
        }),
        fx: Box::new(Counting {
            inner: SyntheticProvider::new(2),
            calls: Arc::clone(calls),
        }),
        alt_data: Box::new(Counting {
            inner: SyntheticProvider::new(3),
            calls: Arc::clone(calls),
        }),
        manual: Box::new(bifx_core::data::manual::ManualFileProvider::new(manual_dir)),
    }
}

fn offline_set(manual_dir: &std::path::Path) -> ProviderSet {
    ProviderSet {
        market: Box::new(Offline),
        fx: Box::new(Offline),
        alt_data: Box::new(Offline),
        manual: Box::new(bifx_core::data::manual::ManualFileProvider::new(manual_dir)),
    }
}

fn small_catalog() -> SourceCatalog {
    SourceCatalog::new(
        vec![
            SourceDescriptor::new("XU100", ProviderKind::MarketApi, "XU100.IS"),
            SourceDescriptor::new("USDTRY", ProviderKind::FxApi, "TRY"),
        ],
        vec!["dolar".into(), "faiz".into()],
    )
}

#[test]
fn rerun_within_validity_window_is_served_from_cache() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = DataLoader::new(
        counting_set(&calls, dir.path()),
        CacheStore::new(dir.path()),
        options(true),
    )
    .load_all(&small_catalog());
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(first.names(), vec!["GoogleTrends", "USDTRY", "XU100"]);

    let second = DataLoader::new(
        counting_set(&calls, dir.path()),
        CacheStore::new(dir.path()),
        options(true),
    )
    .load_all(&small_catalog());
    assert_eq!(calls.load(Ordering::SeqCst), 3, "no provider call on a warm cache");

    for name in first.names() {
        assert_eq!(first.get(name), second.get(name), "{name} differs after reload");
    }
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn disabled_cache_always_fetches() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = DataLoader::new(
        counting_set(&calls, dir.path()),
        CacheStore::new(dir.path()),
        options(false),
    );
    let xu100 = SourceDescriptor::new("XU100", ProviderKind::MarketApi, "XU100.IS");

    let (_, origin) = loader.load_source_traced(&xu100);
    assert_eq!(origin, LoadOrigin::Provider);
    loader.load_source(&xu100);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(!loader.cache().entry_path("XU100").exists());
}

#[test]
fn every_source_failing_yields_starved_bundle() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = tempfile::tempdir().unwrap();
    let loader = DataLoader::new(offline_set(dir.path()), CacheStore::new(dir.path()), options(true));

    let bundle = loader.load_all(&SourceCatalog::default());
    assert!(bundle.is_empty());
    assert!(bundle.is_starved());
    assert!(!bundle.contains(SEARCH_INTEREST_SOURCE));
}

#[test]
fn one_failing_source_does_not_stop_the_others() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cds_manual.csv"),
        "Date,Value\n2024-01-02,310\n2024-01-03,325.5\n",
    )
    .unwrap();

    let loader = DataLoader::new(offline_set(dir.path()), CacheStore::new(dir.path()), options(false));
    let bundle = loader.load_all(&SourceCatalog::default());
    assert_eq!(bundle.names(), vec!["CDS"]);
    assert_eq!(bundle.get("CDS").unwrap().len(), 2);
}

#[test]
fn missing_fx_credential_downgrades_to_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let providers =
        ProviderSet::live(dir.path(), &Credentials::default(), Duration::from_secs(1)).unwrap();
    let loader = DataLoader::new(providers, CacheStore::new(dir.path()), options(true));

    let usdtry = SourceDescriptor::new("USDTRY", ProviderKind::FxApi, "TRY");
    let (table, origin) = loader.load_source_traced(&usdtry);
    assert!(table.is_empty());
    assert_eq!(origin, LoadOrigin::Unavailable);
}

#[test]
fn missing_manual_file_downgrades_to_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let loader = DataLoader::new(offline_set(dir.path()), CacheStore::new(dir.path()), options(true));
    let cds = SourceDescriptor::new("CDS", ProviderKind::ManualFile, "cds_manual.csv");
    assert!(loader.load_source(&cds).is_empty());
}

#[test]
fn disabled_sources_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = DataLoader::new(
        counting_set(&calls, dir.path()),
        CacheStore::new(dir.path()),
        options(false),
    );
    let catalog = SourceCatalog::new(
        vec![SourceDescriptor::new("BRENT", ProviderKind::MarketApi, "BZ=F").disabled()],
        vec![],
    );
    let bundle = loader.load_all(&catalog);
    assert!(bundle.is_empty());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn manual_file_without_numbers_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("cds_manual.csv"),
        "Date,Value\n2024-01-02,n/a\n2024-01-03,-\n",
    )
    .unwrap();

    let loader = DataLoader::new(offline_set(dir.path()), CacheStore::new(dir.path()), options(true));
    let cds = SourceDescriptor::new("CDS", ProviderKind::ManualFile, "cds_manual.csv");
    let (table, origin) = loader.load_source_traced(&cds);
    assert!(table.is_empty());
    assert_eq!(origin, LoadOrigin::Unavailable);
    assert!(!CacheStore::new(dir.path()).entry_path("CDS").exists());

    let bundle = loader.load_all(&SourceCatalog::default());
    assert!(!bundle.contains("CDS"));
    assert!(bundle.is_starved());
}

#[test]
fn bundle_ignores_tables_without_values() {
    let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let hollow = TimeSeriesTable::from_rows(&["Value"], vec![(day, vec![None])]).unwrap();
    let mut bundle = bifx_core::DatasetBundle::new();
    assert!(!bundle.insert("CDS", hollow));
    assert!(bundle.is_starved());
}
