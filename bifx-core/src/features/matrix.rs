//! Feature matrix: one column per computed feature on the union of their dates.
//!
//! A feature with no observation on a date leaves that cell `None`, never zero.
//! Columns are kept sorted by name so the matrix is independent of the order
//! in which units finished.

use crate::series::{Series, TableColumn};
use chrono::NaiveDate;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    dates: Vec<NaiveDate>,
    columns: Vec<TableColumn>,
}

impl FeatureMatrix {
    /// Outer-join series on date. Only present observations contribute dates;
    /// series without any present value are skipped. A repeated name keeps the
    /// last series.
    pub fn from_series(series: Vec<Series>) -> Self {
        let mut kept: Vec<Series> = Vec::with_capacity(series.len());
        for s in series.into_iter().map(|s| s.drop_missing()) {
            if s.is_empty() {
                continue;
            }
            kept.retain(|k| k.name != s.name);
            kept.push(s);
        }
        kept.sort_by(|a, b| a.name.cmp(&b.name));

        let dates: Vec<NaiveDate> = kept
            .iter()
            .flat_map(|s| s.dates.iter().copied())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let columns = kept
            .iter()
            .map(|s| TableColumn {
                name: s.name.clone(),
                values: dates.iter().map(|d| s.get(*d)).collect(),
            })
            .collect();

        Self { dates, columns }
    }

    /// Columns already aligned on `dates`.
    pub(crate) fn from_columns(dates: Vec<NaiveDate>, columns: Vec<TableColumn>) -> Self {
        Self { dates, columns }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Number of feature columns.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
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

    pub fn column(&self, name: &str) -> Option<Series> {
        self.columns.iter().find(|c| c.name == name).map(|c| Series {
            name: c.name.clone(),
            dates: self.dates.clone(),
            values: c.values.clone(),
        })
    }

    /// Every column as a series on the matrix date index.
    pub fn series(&self) -> impl Iterator<Item = Series> + '_ {
        self.columns.iter().map(|c| Series {
            name: c.name.clone(),
            dates: self.dates.clone(),
            values: c.values.clone(),
        })
    }

    /// Fraction of missing cells per column, in column order.
    pub fn missing_fractions(&self) -> Vec<(String, f64)> {
        let n = self.len();
        self.columns
            .iter()
            .map(|c| {
                let missing = c.values.iter().filter(|v| v.is_none()).count();
                let frac = if n == 0 { 1.0 } else { missing as f64 / n as f64 };
                (c.name.clone(), frac)
            })
            .collect()
    }

    /// Columns whose missing fraction is strictly above `threshold`.
    pub fn sparse_columns(&self, threshold: f64) -> Vec<(String, f64)> {
        self.missing_fractions()
            .into_iter()
            .filter(|(_, frac)| *frac > threshold)
            .collect()
    }
}
