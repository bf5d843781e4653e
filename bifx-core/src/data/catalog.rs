//! Source catalog: the declarative list of series the pipeline acquires.
//!
//! Each source is bound to exactly one provider kind and a provider-specific
//! symbol. Provider tags are parsed into a closed enum when the configuration
//! is loaded, so an unknown tag is a configuration error and never a runtime
//! string-mismatch fallthrough.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Name under which the joint search-interest table is stored in the bundle
/// and the cache.
pub const SEARCH_INTEREST_SOURCE: &str = "GoogleTrends";

/// The external system a source is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    /// Daily OHLC market data (Yahoo Finance chart API).
    #[serde(rename = "market-api", alias = "yfinance")]
    MarketApi,
    /// Daily FX rates behind an API key (Alpha Vantage).
    #[serde(rename = "fx-api", alias = "alphavantage")]
    FxApi,
    /// Search-interest series (Google Trends).
    #[serde(rename = "alt-data-api", alias = "pytrends")]
    AltDataApi,
    /// A CSV file placed by hand in the manual data directory.
    #[serde(rename = "manual-file", alias = "manual")]
    ManualFile,
}

impl ProviderKind {
    pub fn tag(&self) -> &'static str {
        match self {
            ProviderKind::MarketApi => "market-api",
            ProviderKind::FxApi => "fx-api",
            ProviderKind::AltDataApi => "alt-data-api",
            ProviderKind::ManualFile => "manual-file",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One configured data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Unique key; also the cache key and the bundle key.
    pub name: String,
    pub provider: ProviderKind,
    /// Ticker, currency code, keyword or file name, depending on the provider.
    pub symbol: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SourceDescriptor {
    pub fn new(name: &str, provider: ProviderKind, symbol: &str) -> Self {
        Self {
            name: name.to_string(),
            provider,
            symbol: symbol.to_string(),
            enabled: true,
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// `lookback_days` calendar days ending at `end`. `None` when the start
    /// would fall outside the representable calendar.
    pub fn lookback(end: NaiveDate, lookback_days: i64) -> Option<Self> {
        let start = chrono::TimeDelta::try_days(lookback_days)
            .and_then(|span| end.checked_sub_signed(span))?;
        Some(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// The full set of sources plus the keyword set for the joint search-interest load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCatalog {
    pub sources: Vec<SourceDescriptor>,
    #[serde(default)]
    pub search_keywords: Vec<String>,
}

impl SourceCatalog {
    pub fn new(sources: Vec<SourceDescriptor>, search_keywords: Vec<String>) -> Self {
        Self {
            sources,
            search_keywords,
        }
    }

    /// Sources with `enabled = true`, in catalog order.
    pub fn enabled(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled)
    }

    pub fn get(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources.iter().find(|s| s.name == name)
    }

    /// Names that appear more than once (including a clash with the
    /// search-interest key when keywords are configured).
    pub fn duplicate_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut dups = Vec::new();
        if !self.search_keywords.is_empty() {
            seen.insert(SEARCH_INTEREST_SOURCE.to_string());
        }
        for s in &self.sources {
            if !seen.insert(s.name.clone()) && !dups.contains(&s.name) {
                dups.push(s.name.clone());
            }
        }
        dups
    }
}

impl Default for SourceCatalog {
    /// Borsa Istanbul fear-index sources.
    fn default() -> Self {
        Self {
            sources: vec![
                SourceDescriptor::new("XU100", ProviderKind::MarketApi, "XU100.IS"),
                SourceDescriptor::new("USDTRY", ProviderKind::FxApi, "TRY"),
                SourceDescriptor::new("VIX", ProviderKind::MarketApi, "^VIX"),
                SourceDescriptor::new("SP500", ProviderKind::MarketApi, "^GSPC"),
                SourceDescriptor::new("CDS", ProviderKind::ManualFile, "cds_manual.csv"),
                SourceDescriptor::new("BRENT", ProviderKind::MarketApi, "BZ=F").disabled(),
                SourceDescriptor::new("GOLD", ProviderKind::MarketApi, "GC=F").disabled(),
                SourceDescriptor::new("BTC", ProviderKind::MarketApi, "BTC-USD").disabled(),
            ],
            search_keywords: vec![
                "borsa istanbul".into(),
                "dolar".into(),
                "ekonomi krizi".into(),
                "faiz".into(),
            ],
        }
    }
}
