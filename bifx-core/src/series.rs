//! Date-indexed numeric series and multi-column time series tables.
//!
//! Missing values are explicit (`Option<f64>`) everywhere. A `None` cell means
//! "no observation", which is never the same thing as zero. Dates are strictly
//! increasing; days without an observation are simply absent.
//!
//! Rolling helpers follow the usual "full window" convention: an output is only
//! produced when every value inside the window is present.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shape violations for series and tables.
#[derive(Debug, Error, PartialEq)]
pub enum SeriesError {
    #[error("series '{name}' has {dates} dates but {values} values")]
    LengthMismatch {
        name: String,
        dates: usize,
        values: usize,
    },

    #[error("series '{name}' dates are not strictly increasing at {at}")]
    UnorderedDates { name: String, at: NaiveDate },

    #[error("row for {date} has {found} values, expected {expected}")]
    RowWidth {
        date: NaiveDate,
        expected: usize,
        found: usize,
    },
}

// ─── Series ─────────────────────────────────────────────────────────

/// A named, date-indexed numeric sequence with explicit missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<Option<f64>>,
}

impl Series {
    /// Build a series, rejecting mismatched lengths and unordered dates.
    pub fn new(
        name: impl Into<String>,
        dates: Vec<NaiveDate>,
        values: Vec<Option<f64>>,
    ) -> Result<Self, SeriesError> {
        let series = Self {
            name: name.into(),
            dates,
            values,
        };
        series.validate()?;
        Ok(series)
    }

    /// An empty series. Feature units return this when their inputs are unavailable.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from fully-present `(date, value)` points.
    pub fn from_values(
        name: impl Into<String>,
        points: impl IntoIterator<Item = (NaiveDate, f64)>,
    ) -> Result<Self, SeriesError> {
        let (dates, values): (Vec<_>, Vec<_>) =
            points.into_iter().map(|(d, v)| (d, Some(v))).unzip();
        Self::new(name, dates, values)
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> Result<(), SeriesError> {
        if self.dates.len() != self.values.len() {
            return Err(SeriesError::LengthMismatch {
                name: self.name.clone(),
                dates: self.dates.len(),
                values: self.values.len(),
            });
        }
        check_ascending(&self.name, &self.dates)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Number of present values.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// True when the series carries no present value at all.
    pub fn is_all_missing(&self) -> bool {
        self.valid_count() == 0
    }

    /// Present values in date order.
    pub fn valid_values(&self) -> Vec<f64> {
        self.values.iter().flatten().copied().collect()
    }

    /// Value on a date, `None` if the date is absent or the cell is missing.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .and_then(|i| self.values[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    pub fn rename(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Turn NaN and infinities into missing values.
    pub fn sanitized(mut self) -> Self {
        for v in &mut self.values {
            if matches!(v, Some(x) if !x.is_finite()) {
                *v = None;
            }
        }
        self
    }

    /// Drop dates whose value is missing.
    pub fn drop_missing(&self) -> Self {
        let (dates, values) = self
            .iter()
            .filter(|(_, v)| v.is_some())
            .unzip();
        Self {
            name: self.name.clone(),
            dates,
            values,
        }
    }

    /// Apply `f` to every present value.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        self.with_values(self.values.iter().map(|v| v.map(&f)).collect())
    }

    pub fn abs(&self) -> Self {
        self.map(f64::abs)
    }

    /// Simple period-over-period return; the first point is missing.
    pub fn pct_change(&self) -> Self {
        self.pairwise(|prev, cur| {
            if prev == 0.0 {
                None
            } else {
                Some(cur / prev - 1.0)
            }
        })
    }

    /// First difference; the first point is missing.
    pub fn diff(&self) -> Self {
        self.pairwise(|prev, cur| Some(cur - prev))
    }

    /// Rolling mean over `window` observations.
    pub fn rolling_mean(&self, window: usize) -> Self {
        self.rolling(window, 1, |w| Some(mean(w)))
    }

    /// Rolling sample standard deviation over `window` observations.
    pub fn rolling_std(&self, window: usize) -> Self {
        self.rolling(window, 2, sample_std)
    }

    /// Rolling z-score: `(x - mean) / std` over the trailing window including `x`.
    ///
    /// A zero-variance window yields a missing value rather than an infinity.
    pub fn rolling_zscore(&self, window: usize) -> Self {
        let means = self.rolling_mean(window);
        let stds = self.rolling_std(window);
        let values = self
            .values
            .iter()
            .zip(means.values.iter().zip(stds.values.iter()))
            .map(|(v, (m, s))| match (v, m, s) {
                (Some(v), Some(m), Some(s)) if *s > 0.0 => Some((v - m) / s),
                _ => None,
            })
            .collect();
        self.with_values(values)
    }

    /// Rolling Pearson correlation against `other` on the shared date index.
    ///
    /// Both series must carry the same dates; a window with zero variance on
    /// either side yields a missing value.
    pub fn rolling_corr(&self, other: &Series, window: usize) -> Option<Self> {
        if self.dates != other.dates {
            return None;
        }
        let n = self.len();
        let mut values = vec![None; n];
        if window >= 2 {
            for end in window..=n {
                let start = end - window;
                let xs: Option<Vec<f64>> = self.values[start..end].iter().copied().collect();
                let ys: Option<Vec<f64>> = other.values[start..end].iter().copied().collect();
                if let (Some(xs), Some(ys)) = (xs, ys) {
                    values[end - 1] = pearson(&xs, &ys);
                }
            }
        }
        Some(self.with_values(values))
    }

    /// Restrict both series to the dates they share (values kept, missing included).
    pub fn intersect(&self, other: &Series) -> (Series, Series) {
        let mut dates = Vec::new();
        let mut left = Vec::new();
        let mut right = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.len() && j < other.len() {
            match self.dates[i].cmp(&other.dates[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dates.push(self.dates[i]);
                    left.push(self.values[i]);
                    right.push(other.values[j]);
                    i += 1;
                    j += 1;
                }
            }
        }
        (
            Series {
                name: self.name.clone(),
                dates: dates.clone(),
                values: left,
            },
            Series {
                name: other.name.clone(),
                dates,
                values: right,
            },
        )
    }

    /// Same dates and name, new values. Length must match.
    fn with_values(&self, values: Vec<Option<f64>>) -> Self {
        debug_assert_eq!(values.len(), self.dates.len());
        Self {
            name: self.name.clone(),
            dates: self.dates.clone(),
            values,
        }
    }

    fn pairwise(&self, f: impl Fn(f64, f64) -> Option<f64>) -> Self {
        let mut values = Vec::with_capacity(self.len());
        for i in 0..self.len() {
            let v = if i == 0 {
                None
            } else {
                match (self.values[i - 1], self.values[i]) {
                    (Some(prev), Some(cur)) => f(prev, cur),
                    _ => None,
                }
            };
            values.push(v);
        }
        self.with_values(values)
    }

    fn rolling(&self, window: usize, min_window: usize, f: impl Fn(&[f64]) -> Option<f64>) -> Self {
        let n = self.len();
        let mut values = vec![None; n];
        if window >= min_window && window > 0 {
            let mut buf = Vec::with_capacity(window);
            for end in window..=n {
                buf.clear();
                let complete = self.values[end - window..end].iter().all(|v| {
                    if let Some(x) = v {
                        buf.push(*x);
                        true
                    } else {
                        false
                    }
                });
                if complete {
                    values[end - 1] = f(&buf);
                }
            }
        }
        self.with_values(values)
    }
}

// ─── Time series table ──────────────────────────────────────────────

/// One value column of a `TimeSeriesTable`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Dates plus one or more numeric columns, as acquired from a provider.
///
/// Column order is the provider's order and is preserved through the cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesTable {
    dates: Vec<NaiveDate>,
    columns: Vec<TableColumn>,
}

impl TimeSeriesTable {
    /// Build a table from a date index and its columns.
    pub fn new(dates: Vec<NaiveDate>, columns: Vec<TableColumn>) -> Result<Self, SeriesError> {
        check_ascending("table", &dates)?;
        for col in &columns {
            if col.values.len() != dates.len() {
                return Err(SeriesError::LengthMismatch {
                    name: col.name.clone(),
                    dates: dates.len(),
                    values: col.values.len(),
                });
            }
        }
        Ok(Self { dates, columns })
    }

    /// Build from unordered rows. Rows are sorted by date; for a repeated date
    /// the last row wins.
    pub fn from_rows(
        column_names: &[&str],
        mut rows: Vec<(NaiveDate, Vec<Option<f64>>)>,
    ) -> Result<Self, SeriesError> {
        for (date, values) in &rows {
            if values.len() != column_names.len() {
                return Err(SeriesError::RowWidth {
                    date: *date,
                    expected: column_names.len(),
                    found: values.len(),
                });
            }
        }
        // Stable sort keeps provider order among equal dates, so "last wins" holds.
        rows.sort_by_key(|(d, _)| *d);
        let mut deduped: Vec<(NaiveDate, Vec<Option<f64>>)> = Vec::with_capacity(rows.len());
        for row in rows {
            match deduped.last_mut() {
                Some(last) if last.0 == row.0 => *last = row,
                _ => deduped.push(row),
            }
        }

        let mut columns: Vec<TableColumn> = column_names
            .iter()
            .map(|name| TableColumn {
                name: name.to_string(),
                values: Vec::with_capacity(deduped.len()),
            })
            .collect();
        let mut dates = Vec::with_capacity(deduped.len());
        for (date, values) in deduped {
            dates.push(date);
            for (col, v) in columns.iter_mut().zip(values) {
                col.values.push(v.filter(|x| x.is_finite()));
            }
        }
        Ok(Self { dates, columns })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// True when no column holds a single present value.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
            || self
                .columns
                .iter()
                .all(|c| c.values.iter().all(Option::is_none))
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Extract a column as a series named after the column.
    pub fn column(&self, name: &str) -> Option<Series> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| self.column_series(c))
    }

    pub fn first_column(&self) -> Option<Series> {
        self.columns.first().map(|c| self.column_series(c))
    }

    /// The closing-price column (`Close`, falling back to `close`).
    pub fn close(&self) -> Option<Series> {
        self.column("Close").or_else(|| self.column("close"))
    }

    /// Keep rows with `start <= date <= end`.
    pub fn restrict(&self, start: NaiveDate, end: NaiveDate) -> Self {
        let keep: Vec<bool> = self.dates.iter().map(|d| *d >= start && *d <= end).collect();
        let dates = self
            .dates
            .iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(d, _)| *d)
            .collect();
        let columns = self
            .columns
            .iter()
            .map(|c| TableColumn {
                name: c.name.clone(),
                values: c
                    .values
                    .iter()
                    .zip(&keep)
                    .filter(|(_, k)| **k)
                    .map(|(v, _)| *v)
                    .collect(),
            })
            .collect();
        Self { dates, columns }
    }

    /// Same table without the named column (no-op if absent).
    pub fn without_column(mut self, name: &str) -> Self {
        self.columns.retain(|c| c.name != name);
        self
    }

    /// Per-row mean of the present cells across all columns.
    pub fn row_mean(&self, name: &str) -> Series {
        let values = (0..self.len())
            .map(|i| {
                let present: Vec<f64> = self.columns.iter().filter_map(|c| c.values[i]).collect();
                if present.is_empty() {
                    None
                } else {
                    Some(mean(&present))
                }
            })
            .collect();
        Series {
            name: name.to_string(),
            dates: self.dates.clone(),
            values,
        }
    }

    /// Feed the table's content into a hasher (dates, column names, value bits).
    pub fn hash_into(&self, hasher: &mut blake3::Hasher) {
        for date in &self.dates {
            hasher.update(date.to_string().as_bytes());
        }
        for col in &self.columns {
            hasher.update(col.name.as_bytes());
            for v in &col.values {
                match v {
                    Some(x) => hasher.update(&x.to_le_bytes()),
                    None => hasher.update(b"null"),
                };
            }
        }
    }

    /// BLAKE3 content hash as hex.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        self.hash_into(&mut hasher);
        hasher.finalize().to_hex().to_string()
    }

    fn column_series(&self, col: &TableColumn) -> Series {
        Series {
            name: col.name.clone(),
            dates: self.dates.clone(),
            values: col.values.clone(),
        }
    }
}

// ─── Numeric helpers ────────────────────────────────────────────────

fn check_ascending(name: &str, dates: &[NaiveDate]) -> Result<(), SeriesError> {
    for w in dates.windows(2) {
        if w[1] <= w[0] {
            return Err(SeriesError::UnorderedDates {
                name: name.to_string(),
                at: w[1],
            });
        }
    }
    Ok(())
}

pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1). `None` below two observations.
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    let mx = mean(xs);
    let my = mean(ys);
    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        cov += (x - mx) * (y - my);
        vx += (x - mx).powi(2);
        vy += (y - my).powi(2);
    }
    if vx <= 0.0 || vy <= 0.0 {
        return None;
    }
    Some(cov / (vx.sqrt() * vy.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn series(values: &[Option<f64>]) -> Series {
        Series::new(
            "s",
            (1..=values.len() as u32).map(d).collect(),
            values.to_vec(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_unordered_dates() {
        let err = Series::new("x", vec![d(2), d(1)], vec![Some(1.0), Some(2.0)]).unwrap_err();
        assert!(matches!(err, SeriesError::UnorderedDates { .. }));
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = Series::new("x", vec![d(1)], vec![]).unwrap_err();
        assert!(matches!(err, SeriesError::LengthMismatch { .. }));
    }

    #[test]
    fn pct_change_keeps_missing_explicit() {
        let s = series(&[Some(100.0), Some(110.0), None, Some(99.0)]).pct_change();
        assert_eq!(s.values[0], None);
        assert!((s.values[1].unwrap() - 0.1).abs() < 1e-12);
        assert_eq!(s.values[2], None);
        assert_eq!(s.values[3], None);
    }

    #[test]
    fn rolling_std_needs_full_window() {
        let s = series(&[Some(1.0), Some(2.0), Some(3.0), None, Some(5.0)]).rolling_std(2);
        assert_eq!(s.values[0], None);
        assert!((s.values[1].unwrap() - (0.5f64).sqrt()).abs() < 1e-12);
        assert_eq!(s.values[3], None);
        assert_eq!(s.values[4], None);
    }

    #[test]
    fn rolling_zscore_of_flat_window_is_missing() {
        let s = series(&[Some(3.0), Some(3.0), Some(3.0)]).rolling_zscore(3);
        assert_eq!(s.values, vec![None, None, None]);
    }

    #[test]
    fn rolling_corr_of_identical_series_is_one() {
        let s = series(&[Some(1.0), Some(3.0), Some(2.0), Some(5.0)]);
        let c = s.rolling_corr(&s, 3).unwrap();
        assert!((c.values[2].unwrap() - 1.0).abs() < 1e-12);
        assert!((c.values[3].unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn intersect_keeps_common_dates_only() {
        let a = Series::new("a", vec![d(1), d(2), d(4)], vec![Some(1.0); 3]).unwrap();
        let b = Series::new("b", vec![d(2), d(3), d(4)], vec![Some(2.0); 3]).unwrap();
        let (l, r) = a.intersect(&b);
        assert_eq!(l.dates, vec![d(2), d(4)]);
        assert_eq!(r.dates, vec![d(2), d(4)]);
    }

    #[test]
    fn from_rows_sorts_and_dedups() {
        let table = TimeSeriesTable::from_rows(
            &["Close"],
            vec![
                (d(3), vec![Some(3.0)]),
                (d(1), vec![Some(1.0)]),
                (d(3), vec![Some(30.0)]),
            ],
        )
        .unwrap();
        assert_eq!(table.dates(), &[d(1), d(3)]);
        assert_eq!(table.close().unwrap().values, vec![Some(1.0), Some(30.0)]);
    }

    #[test]
    fn from_rows_rejects_ragged_rows() {
        let err = TimeSeriesTable::from_rows(&["a", "b"], vec![(d(1), vec![Some(1.0)])]);
        assert!(matches!(err, Err(SeriesError::RowWidth { .. })));
    }

    #[test]
    fn restrict_and_drop_column() {
        let table = TimeSeriesTable::from_rows(
            &["a", "isPartial"],
            (1..=5).map(|i| (d(i), vec![Some(i as f64), Some(0.0)])).collect(),
        )
        .unwrap();
        let cut = table.restrict(d(2), d(4)).without_column("isPartial");
        assert_eq!(cut.len(), 3);
        assert_eq!(cut.column_names(), vec!["a"]);
    }

    #[test]
    fn row_mean_skips_missing_cells() {
        let table = TimeSeriesTable::from_rows(
            &["a", "b"],
            vec![(d(1), vec![Some(2.0), None]), (d(2), vec![None, None])],
        )
        .unwrap();
        let m = table.row_mean("m");
        assert_eq!(m.values, vec![Some(2.0), None]);
    }

    #[test]
    fn table_without_present_values_is_empty() {
        let table = TimeSeriesTable::from_rows(
            &["a", "b"],
            vec![(d(1), vec![None, None]), (d(2), vec![None, None])],
        )
        .unwrap();
        assert_eq!(table.len(), 2);
        assert!(table.is_empty());

        let one = TimeSeriesTable::from_rows(&["a"], vec![(d(1), vec![Some(0.0)])]).unwrap();
        assert!(!one.is_empty());
    }

    #[test]
    fn content_hash_is_stable() {
        let table =
            TimeSeriesTable::from_rows(&["a"], vec![(d(1), vec![Some(1.5)])]).unwrap();
        assert_eq!(table.content_hash(), table.clone().content_hash());
    }
}
