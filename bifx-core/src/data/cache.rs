//! Parquet cache store, one file per source.
//!
//! Layout: `{cache_dir}/{SOURCE}.parquet` plus a `{SOURCE}.meta.json` sidecar.
//!
//! - Freshness is decided purely by the parquet file's modification time
//!   against a validity window in whole days. The sidecar is informational.
//! - Writes are atomic (write to `.tmp`, rename into place) and overwrite any
//!   prior entry.
//! - Corrupt files are quarantined (`{file}.quarantined`) on load.
//! - The table is stored exactly as acquired: a `date` column followed by every
//!   provider column, nulls preserved.

use super::provider::DataError;
use crate::series::{TableColumn, TimeSeriesTable};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

const DATE_COLUMN: &str = "date";
const SECS_PER_DAY: u64 = 86_400;

/// Metadata sidecar for a cached source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheMeta {
    pub source: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub data_hash: String,
    pub cached_at: chrono::NaiveDateTime,
}

/// Cache status for a single source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatus {
    pub source: String,
    pub cached: bool,
    pub age_days: Option<u64>,
    pub row_count: Option<usize>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// The on-disk cache store.
#[derive(Debug, Clone)]
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Path of the cached table for a source.
    pub fn entry_path(&self, source: &str) -> PathBuf {
        self.cache_dir.join(format!("{source}.parquet"))
    }

    fn meta_path(&self, source: &str) -> PathBuf {
        self.cache_dir.join(format!("{source}.meta.json"))
    }

    /// Whole days since the entry was last written, `None` if there is no entry.
    pub fn age_days(&self, source: &str, now: SystemTime) -> Option<u64> {
        let modified = fs::metadata(self.entry_path(source))
            .and_then(|m| m.modified())
            .ok()?;
        // A clock that moved backwards reads as a brand-new file.
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        Some(age.as_secs() / SECS_PER_DAY)
    }

    /// True when an entry exists and is younger than `validity_days` whole days.
    pub fn is_fresh(&self, source: &str, validity_days: u32, now: SystemTime) -> bool {
        self.age_days(source, now)
            .is_some_and(|age| age < u64::from(validity_days))
    }

    /// Write a table for a source, replacing any previous entry.
    pub fn write(&self, source: &str, table: &TimeSeriesTable) -> Result<(), DataError> {
        if table.is_empty() {
            return Err(DataError::CacheError("refusing to cache an empty table".into()));
        }

        fs::create_dir_all(&self.cache_dir)
            .map_err(|e| DataError::CacheError(format!("failed to create dir: {e}")))?;

        let mut df = table_to_dataframe(table)?;
        let path = self.entry_path(source);
        let tmp_path = path.with_extension("parquet.tmp");

        write_parquet(&mut df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::CacheError(format!("atomic rename failed: {e}"))
        })?;

        let meta = CacheMeta {
            source: source.to_string(),
            start_date: table.dates().first().copied(),
            end_date: table.dates().last().copied(),
            row_count: table.len(),
            columns: table.column_names().iter().map(|c| c.to_string()).collect(),
            data_hash: table.content_hash(),
            cached_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::CacheError(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(source), meta_json)
            .map_err(|e| DataError::CacheError(format!("meta write: {e}")))?;

        Ok(())
    }

    /// Load the cached table for a source.
    ///
    /// A file that fails to parse is moved aside so the next run refetches it.
    pub fn load(&self, source: &str) -> Result<TimeSeriesTable, DataError> {
        let path = self.entry_path(source);
        if !path.exists() {
            return Err(DataError::CacheError(format!("no cache entry for '{source}'")));
        }
        match read_parquet(&path) {
            Ok(table) => Ok(table),
            Err(e) => {
                let quarantine = path.with_extension("parquet.quarantined");
                log::warn!(
                    "quarantining corrupt cache file {}: {e}",
                    path.display()
                );
                if let Err(rename_err) = fs::rename(&path, &quarantine) {
                    log::warn!(
                        "failed to quarantine {}: {rename_err}",
                        path.display()
                    );
                }
                Err(e)
            }
        }
    }

    /// Read the metadata sidecar, if any.
    pub fn get_meta(&self, source: &str) -> Option<CacheMeta> {
        let content = fs::read_to_string(self.meta_path(source)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Cache state for each named source.
    pub fn status(&self, sources: &[&str]) -> Vec<CacheStatus> {
        let now = SystemTime::now();
        sources
            .iter()
            .map(|name| {
                let meta = self.get_meta(name);
                let age_days = self.age_days(name, now);
                CacheStatus {
                    source: name.to_string(),
                    cached: age_days.is_some(),
                    age_days,
                    row_count: meta.as_ref().map(|m| m.row_count),
                    start_date: meta.as_ref().and_then(|m| m.start_date),
                    end_date: meta.as_ref().and_then(|m| m.end_date),
                }
            })
            .collect()
    }

    /// Source names with a parquet entry in the cache directory, sorted.
    pub fn cached_sources(&self) -> Vec<String> {
        let Ok(entries) = fs::read_dir(&self.cache_dir) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("parquet"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        names
    }
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::default()
}

/// Convert a table to a DataFrame: `date` first, then provider columns in order.
fn table_to_dataframe(table: &TimeSeriesTable) -> Result<DataFrame, DataError> {
    let days: Vec<i32> = table
        .dates()
        .iter()
        .map(|d| (*d - epoch()).num_days() as i32)
        .collect();

    let mut columns = Vec::with_capacity(table.columns().len() + 1);
    columns.push(
        Column::new(DATE_COLUMN.into(), days)
            .cast(&DataType::Date)
            .map_err(|e| DataError::ParquetError(format!("date cast: {e}")))?,
    );
    for col in table.columns() {
        columns.push(Column::new(col.name.as_str().into(), col.values.clone()));
    }

    DataFrame::new(columns).map_err(|e| DataError::ParquetError(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &mut DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::ParquetError(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(df)
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;
    Ok(())
}

/// Read a parquet file back into a table, validating its shape.
fn read_parquet(path: &Path) -> Result<TimeSeriesTable, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::ParquetError(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::CacheError("empty parquet file".into()));
    }

    let date_col = df
        .column(DATE_COLUMN)
        .map_err(|e| DataError::CacheError(format!("missing date column: {e}")))?;
    let date_ca = date_col
        .date()
        .map_err(|e| DataError::ParquetError(format!("date column type: {e}")))?;

    let mut dates = Vec::with_capacity(df.height());
    for i in 0..df.height() {
        let days = date_ca
            .get(i)
            .ok_or_else(|| DataError::ParquetError(format!("null date at row {i}")))?;
        dates.push(epoch() + chrono::Duration::days(i64::from(days)));
    }

    let mut columns = Vec::new();
    for col in df.get_columns() {
        if col.name().as_str() == DATE_COLUMN {
            continue;
        }
        let casted = col
            .cast(&DataType::Float64)
            .map_err(|e| DataError::ParquetError(format!("column '{}': {e}", col.name())))?;
        let ca = casted
            .f64()
            .map_err(|e| DataError::ParquetError(format!("column '{}': {e}", col.name())))?;
        columns.push(TableColumn {
            name: col.name().to_string(),
            values: ca.into_iter().collect(),
        });
    }

    Ok(TimeSeriesTable::new(dates, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_cache_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = env::temp_dir().join(format!("bifx_cache_test_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample_table() -> TimeSeriesTable {
        let d = |day| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        TimeSeriesTable::from_rows(
            &["Open", "Close", "Volume"],
            vec![
                (d(2), vec![Some(100.0), Some(101.0), Some(1000.0)]),
                (d(3), vec![Some(101.0), None, Some(1100.0)]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn write_and_load_preserves_columns_and_nulls() {
        let dir = temp_cache_dir();
        let cache = CacheStore::new(&dir);

        cache.write("XU100", &sample_table()).unwrap();
        let loaded = cache.load("XU100").unwrap();

        assert_eq!(loaded, sample_table());
        assert_eq!(loaded.column_names(), vec!["Open", "Close", "Volume"]);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn missing_entry_is_not_fresh() {
        let dir = temp_cache_dir();
        let cache = CacheStore::new(&dir);
        assert!(!cache.is_fresh("NOPE", 1, SystemTime::now()));
        assert!(cache.load("NOPE").is_err());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn freshness_follows_mtime() {
        let dir = temp_cache_dir();
        let cache = CacheStore::new(&dir);
        cache.write("VIX", &sample_table()).unwrap();

        let now = SystemTime::now();
        assert!(cache.is_fresh("VIX", 1, now));
        assert!(!cache.is_fresh("VIX", 0, now));

        let two_days_later = now + Duration::from_secs(2 * SECS_PER_DAY + 60);
        assert_eq!(cache.age_days("VIX", two_days_later), Some(2));
        assert!(!cache.is_fresh("VIX", 2, two_days_later));
        assert!(cache.is_fresh("VIX", 3, two_days_later));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_quarantined() {
        let dir = temp_cache_dir();
        let cache = CacheStore::new(&dir);
        fs::write(cache.entry_path("BAD"), b"not parquet").unwrap();

        assert!(cache.load("BAD").is_err());
        assert!(!cache.entry_path("BAD").exists());
        assert!(dir.join("BAD.parquet.quarantined").exists());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn failed_quarantine_still_reports_corruption() {
        let dir = temp_cache_dir();
        let cache = CacheStore::new(&dir);
        fs::write(cache.entry_path("BAD"), b"not parquet").unwrap();
        // a non-empty directory in the way makes the rename fail
        let blocker = dir.join("BAD.parquet.quarantined");
        fs::create_dir_all(&blocker).unwrap();
        fs::write(blocker.join("keep"), b"x").unwrap();

        assert!(cache.load("BAD").is_err());
        assert!(cache.entry_path("BAD").exists());
        assert!(cache.load("BAD").is_err());

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn meta_and_status() {
        let dir = temp_cache_dir();
        let cache = CacheStore::new(&dir);
        cache.write("SP500", &sample_table()).unwrap();

        let meta = cache.get_meta("SP500").unwrap();
        assert_eq!(meta.row_count, 2);
        assert_eq!(meta.data_hash, sample_table().content_hash());

        let statuses = cache.status(&["SP500", "CDS"]);
        assert!(statuses[0].cached);
        assert!(!statuses[1].cached);
        assert_eq!(cache.cached_sources(), vec!["SP500"]);

        let _ = fs::remove_dir_all(&dir);
    }
}
