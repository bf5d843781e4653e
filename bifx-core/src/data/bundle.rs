//! Dataset bundle: the single object handed to every feature unit.
//!
//! A source missing from the bundle means "unavailable"; the loader never
//! inserts empty tables.

use crate::series::TimeSeriesTable;
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct DatasetBundle {
    tables: HashMap<String, TimeSeriesTable>,
}

impl DatasetBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a table. Empty tables are ignored so absence stays the only
    /// "unavailable" signal. Returns whether the table was stored.
    pub fn insert(&mut self, name: impl Into<String>, table: TimeSeriesTable) -> bool {
        if table.is_empty() {
            return false;
        }
        self.tables.insert(name.into(), table);
        true
    }

    pub fn get(&self, name: &str) -> Option<&TimeSeriesTable> {
        self.tables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// True when there is nothing usable: no tables, or only empty ones.
    pub fn is_starved(&self) -> bool {
        self.tables.values().all(TimeSeriesTable::is_empty)
    }

    /// Source names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Deterministic BLAKE3 fingerprint over all tables in sorted name order.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for name in self.names() {
            hasher.update(name.as_bytes());
            if let Some(table) = self.tables.get(name) {
                table.hash_into(&mut hasher);
            }
        }
        hasher.finalize().to_hex().to_string()
    }
}
