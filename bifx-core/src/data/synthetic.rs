//! Synthetic provider for offline runs and demos.
//!
//! Deterministic per symbol: the RNG is seeded from a BLAKE3 hash of the run
//! seed and the symbol, so the same catalog always yields the same data.
//! Market symbols get a weekday random walk around 100; keywords get a
//! weekly search-interest walk clamped to [0, 100]. Results are clearly fake
//! and only meant to exercise the pipeline end to end.

use super::catalog::DateRange;
use super::provider::{DataError, DataProvider, KeywordProvider};
use crate::series::TimeSeriesTable;
use chrono::{Datelike, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const MARKET_COLUMNS: [&str; 5] = ["Open", "High", "Low", "Close", "Volume"];

#[derive(Debug, Clone)]
pub struct SyntheticProvider {
    seed: u64,
}

impl SyntheticProvider {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, key: &str) -> StdRng {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.seed.to_le_bytes());
        hasher.update(key.as_bytes());
        StdRng::from_seed(*hasher.finalize().as_bytes())
    }

    /// Weekday OHLCV random walk over the range.
    pub fn market_table(&self, symbol: &str, range: &DateRange) -> Result<TimeSeriesTable, DataError> {
        let mut rng = self.rng_for(symbol);
        let mut price = 100.0_f64;
        let mut rows = Vec::new();

        for date in days(range).filter(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)) {
            let daily_return: f64 = rng.gen_range(-0.03..0.03);
            let open = price;
            let close = price * (1.0 + daily_return);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
            let volume = rng.gen_range(500_000.0..5_000_000.0_f64).round();
            rows.push((date, vec![Some(open), Some(high), Some(low), Some(close), Some(volume)]));
            price = close;
        }

        if rows.is_empty() {
            return Err(DataError::EmptyResult {
                symbol: symbol.to_string(),
            });
        }
        Ok(TimeSeriesTable::from_rows(&MARKET_COLUMNS, rows)?)
    }

    /// Weekly (Sunday) search-interest walk, one column per keyword.
    pub fn keyword_table(
        &self,
        keywords: &[String],
        range: &DateRange,
    ) -> Result<TimeSeriesTable, DataError> {
        let mut rngs: Vec<StdRng> = keywords.iter().map(|k| self.rng_for(k)).collect();
        let mut levels = vec![50.0_f64; keywords.len()];
        let mut rows = Vec::new();

        for date in days(range).filter(|d| d.weekday() == Weekday::Sun) {
            let values = rngs
                .iter_mut()
                .zip(levels.iter_mut())
                .map(|(rng, level)| {
                    *level = (*level + rng.gen_range(-8.0..8.0)).clamp(0.0, 100.0);
                    Some(level.round())
                })
                .collect();
            rows.push((date, values));
        }

        if rows.is_empty() {
            return Err(DataError::EmptyResult {
                symbol: keywords.join(","),
            });
        }
        let names: Vec<&str> = keywords.iter().map(String::as_str).collect();
        Ok(TimeSeriesTable::from_rows(&names, rows)?)
    }
}

fn days(range: &DateRange) -> impl Iterator<Item = NaiveDate> {
    let end = range.end;
    range.start.iter_days().take_while(move |d| *d <= end)
}

impl DataProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch(&self, symbol: &str, range: &DateRange) -> Result<TimeSeriesTable, DataError> {
        self.market_table(symbol, range)
    }
}

impl KeywordProvider for SyntheticProvider {
    fn name(&self) -> &str {
        "synthetic"
    }

    fn fetch_keywords(
        &self,
        keywords: &[String],
        range: &DateRange,
    ) -> Result<TimeSeriesTable, DataError> {
        self.keyword_table(keywords, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range() -> DateRange {
        DateRange::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
        )
    }

    #[test]
    fn deterministic_per_symbol() {
        let p = SyntheticProvider::new(7);
        let a = p.market_table("XU100.IS", &range()).unwrap();
        let b = p.market_table("XU100.IS", &range()).unwrap();
        let c = p.market_table("^VIX", &range()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn market_table_skips_weekends() {
        let table = SyntheticProvider::new(1).market_table("X", &range()).unwrap();
        assert!(table
            .dates()
            .iter()
            .all(|d| !matches!(d.weekday(), Weekday::Sat | Weekday::Sun)));
        assert_eq!(table.len(), 65);
    }

    #[test]
    fn keyword_levels_stay_in_bounds() {
        let kws = vec!["dolar".to_string(), "faiz".to_string()];
        let table = SyntheticProvider::new(1).keyword_table(&kws, &range()).unwrap();
        for col in table.columns() {
            assert!(col.values.iter().flatten().all(|v| (0.0..=100.0).contains(v)));
        }
    }
}
