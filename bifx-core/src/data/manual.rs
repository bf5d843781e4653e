//! Manual-file adapter: CSV files placed by hand next to the cache.
//!
//! Contract: a `Date` column (`YYYY-MM-DD`) plus one or more value columns.
//! The file is loaded verbatim (no date restriction). Empty or non-numeric
//! cells become missing values. A file without a date column violates the
//! contract and is reported as a source-level failure.

use super::catalog::DateRange;
use super::provider::{DataError, DataProvider};
use crate::series::TimeSeriesTable;
use chrono::NaiveDate;
use std::path::PathBuf;

const DATE_HEADERS: [&str; 2] = ["Date", "date"];

pub struct ManualFileProvider {
    dir: PathBuf,
}

impl ManualFileProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Parse CSV content in the manual file format.
    pub fn parse_csv(source: &str, reader: impl std::io::Read) -> Result<TimeSeriesTable, DataError> {
        let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let headers = rdr
            .headers()
            .map_err(|e| DataError::ContractViolation(format!("{source}: unreadable header: {e}")))?
            .clone();
        let date_idx = headers
            .iter()
            .position(|h| DATE_HEADERS.contains(&h))
            .ok_or_else(|| {
                DataError::ContractViolation(format!("{source}: missing required 'Date' column"))
            })?;
        let value_names: Vec<&str> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != date_idx)
            .map(|(_, h)| h)
            .collect();
        if value_names.is_empty() {
            return Err(DataError::ContractViolation(format!(
                "{source}: no value columns"
            )));
        }

        let mut rows = Vec::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record.map_err(|e| {
                DataError::ContractViolation(format!("{source}: row {}: {e}", line + 2))
            })?;
            let raw_date = record.get(date_idx).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|e| {
                DataError::ContractViolation(format!(
                    "{source}: row {}: bad date '{raw_date}': {e}",
                    line + 2
                ))
            })?;
            let values = record
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != date_idx)
                .map(|(_, cell)| cell.parse::<f64>().ok())
                .collect();
            rows.push((date, values));
        }

        let table = TimeSeriesTable::from_rows(&value_names, rows)?;
        if table.is_empty() {
            return Err(DataError::EmptyResult {
                symbol: source.to_string(),
            });
        }
        Ok(table)
    }
}

impl DataProvider for ManualFileProvider {
    fn name(&self) -> &str {
        "manual_file"
    }

    fn fetch(&self, symbol: &str, _range: &DateRange) -> Result<TimeSeriesTable, DataError> {
        let path = self.dir.join(symbol);
        if !path.exists() {
            return Err(DataError::ManualFileMissing {
                path: path.display().to_string(),
            });
        }
        let file = std::fs::File::open(&path)
            .map_err(|e| DataError::Other(format!("open {}: {e}", path.display())))?;
        let table = Self::parse_csv(symbol, file)?;
        log::info!("loaded manual data from {}", path.display());
        Ok(table)
    }
}
