//! Pipeline configuration: a TOML file resolved once into immutable settings.
//!
//! Every section is optional. `ConfigFile` is the on-disk shape; `PipelineConfig`
//! is what the pipeline runs with, with the date range computed eagerly and
//! every threshold checked.

use bifx_core::data::{
    DateRange, LoaderOptions, SourceCatalog, SourceDescriptor, SEARCH_INTEREST_SOURCE,
};
use bifx_core::features::FeatureConfig;
use bifx_core::index::IndexConfig;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::backtest::BacktestConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// `[data]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    /// Used when `start_date` is absent.
    pub lookback_days: i64,
    pub cache_dir: PathBuf,
    pub use_cache: bool,
    pub cache_days_valid: u32,
    /// Directory holding manual CSV files; defaults to `cache_dir`.
    pub manual_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            start_date: None,
            end_date: None,
            lookback_days: 1095,
            cache_dir: PathBuf::from("data/raw"),
            use_cache: true,
            cache_days_valid: 1,
            manual_dir: None,
            request_timeout_secs: 30,
        }
    }
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    pub dir: PathBuf,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

/// The configuration file as written.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub data: DataSection,
    /// Replaces the built-in catalog when present.
    pub sources: Option<Vec<SourceDescriptor>>,
    pub search_keywords: Option<Vec<String>>,
    pub features: FeatureConfig,
    pub index: IndexConfig,
    pub backtest: BacktestConfig,
    pub output: OutputSection,
}

impl ConfigFile {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub range: DateRange,
    pub cache_dir: PathBuf,
    pub manual_dir: PathBuf,
    pub use_cache: bool,
    pub cache_days_valid: u32,
    pub request_timeout_secs: u64,
    pub catalog: SourceCatalog,
    pub features: FeatureConfig,
    pub index: IndexConfig,
    pub backtest: BacktestConfig,
    pub output_dir: PathBuf,
}

impl Default for PipelineConfig {
    /// Built-in defaults, with the date range ending today.
    fn default() -> Self {
        let today = chrono::Local::now().date_naive();
        let data = DataSection::default();
        Self {
            range: DateRange::lookback(today, data.lookback_days)
                .unwrap_or_else(|| DateRange::new(today, today)),
            manual_dir: data.cache_dir.clone(),
            cache_dir: data.cache_dir,
            use_cache: data.use_cache,
            cache_days_valid: data.cache_days_valid,
            request_timeout_secs: data.request_timeout_secs,
            catalog: SourceCatalog::default(),
            features: FeatureConfig::default(),
            index: IndexConfig::default(),
            backtest: BacktestConfig::default(),
            output_dir: OutputSection::default().dir,
        }
    }
}

impl PipelineConfig {
    /// Read and resolve a config file.
    pub fn load(path: &Path, today: NaiveDate) -> Result<Self, ConfigError> {
        Self::resolve(ConfigFile::from_path(path)?, today)
    }

    /// Compute derived fields and validate.
    pub fn resolve(file: ConfigFile, today: NaiveDate) -> Result<Self, ConfigError> {
        let ConfigFile {
            data,
            sources,
            search_keywords,
            features,
            index,
            backtest,
            output,
        } = file;

        if data.lookback_days <= 0 {
            return Err(ConfigError::Invalid(format!(
                "lookback_days must be positive, got {}",
                data.lookback_days
            )));
        }
        if data.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid("request_timeout_secs must be positive".into()));
        }
        let end = data.end_date.unwrap_or(today);
        let start = match data.start_date {
            Some(start) => start,
            None => DateRange::lookback(end, data.lookback_days)
                .map(|r| r.start)
                .ok_or_else(|| {
                    ConfigError::Invalid(format!(
                        "lookback_days {} reaches before the earliest supported date",
                        data.lookback_days
                    ))
                })?,
        };
        if start > end {
            return Err(ConfigError::Invalid(format!(
                "start_date {start} is after end_date {end}"
            )));
        }

        let defaults = SourceCatalog::default();
        let catalog = SourceCatalog::new(
            sources.unwrap_or(defaults.sources),
            search_keywords.unwrap_or(defaults.search_keywords),
        );

        let config = Self {
            range: DateRange::new(start, end),
            manual_dir: data.manual_dir.unwrap_or_else(|| data.cache_dir.clone()),
            cache_dir: data.cache_dir,
            use_cache: data.use_cache,
            cache_days_valid: data.cache_days_valid,
            request_timeout_secs: data.request_timeout_secs,
            catalog,
            features,
            index,
            backtest,
            output_dir: output.dir,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let dups = self.catalog.duplicate_names();
        if !dups.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "duplicate source names: {} ({SEARCH_INTEREST_SOURCE} is reserved when search_keywords is set)",
                dups.join(", ")
            )));
        }
        if let Some(s) = self.catalog.sources.iter().find(|s| s.name.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!(
                "source with symbol '{}' has an empty name",
                s.symbol
            )));
        }

        let f = &self.features;
        for (field, window) in [
            ("realized_vol_window", f.realized_vol_window),
            ("usdtry_shock_window", f.usdtry_shock_window),
            ("cds_spike_window", f.cds_spike_window),
            ("sentiment_window", f.sentiment_window),
            ("correlation_window", f.correlation_window),
        ] {
            if window < 2 {
                return Err(ConfigError::Invalid(format!(
                    "features.{field} must be at least 2, got {window}"
                )));
            }
        }
        if !(0.0..=1.0).contains(&f.missing_threshold) {
            return Err(ConfigError::Invalid(format!(
                "features.missing_threshold must be within [0, 1], got {}",
                f.missing_threshold
            )));
        }

        self.index
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.backtest
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        match self.catalog.get(&self.backtest.reference_source) {
            Some(s) if s.enabled => Ok(()),
            Some(_) => Err(ConfigError::Invalid(format!(
                "backtest reference source '{}' is disabled",
                self.backtest.reference_source
            ))),
            None => Err(ConfigError::Invalid(format!(
                "backtest reference source '{}' is not in the source list",
                self.backtest.reference_source
            ))),
        }
    }

    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            range: self.range,
            use_cache: self.use_cache,
            cache_days_valid: self.cache_days_valid,
        }
    }

    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bifx_core::data::ProviderKind;
    use bifx_core::index::NormalizationMethod;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
    }

    #[test]
    fn empty_file_resolves_to_defaults() {
        let cfg = PipelineConfig::resolve(ConfigFile::from_toml("").unwrap(), today()).unwrap();
        assert_eq!(cfg.range.end, today());
        assert_eq!(cfg.range.start, today() - chrono::Duration::days(1095));
        assert_eq!(cfg.catalog, SourceCatalog::default());
        assert_eq!(cfg.manual_dir, PathBuf::from("data/raw"));
        assert_eq!(cfg.index.ema_span, 5);
        assert_eq!(cfg.backtest.crash_threshold, -0.02);
    }

    #[test]
    fn full_file_parses() {
        let toml = r#"
            search_keywords = ["dolar"]

            [data]
            start_date = "2024-01-01"
            end_date = "2024-12-31"
            cache_dir = "/tmp/bifx"
            cache_days_valid = 3

            [[sources]]
            name = "XU100"
            provider = "yfinance"
            symbol = "XU100.IS"

            [[sources]]
            name = "USDTRY"
            provider = "fx-api"
            symbol = "TRY"
            enabled = false

            [features]
            realized_vol_window = 10
            parallel = true

            [index]
            normalization = "zscore_percentile"
            ema_span = 3
            weights = { realized_vol = 1.0 }

            [backtest]
            crash_threshold = -0.03

            [output]
            dir = "out"
        "#;
        let cfg = PipelineConfig::resolve(ConfigFile::from_toml(toml).unwrap(), today()).unwrap();
        assert_eq!(cfg.range.start, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(cfg.catalog.sources.len(), 2);
        assert_eq!(cfg.catalog.sources[0].provider, ProviderKind::MarketApi);
        assert!(!cfg.catalog.sources[1].enabled);
        assert_eq!(cfg.catalog.search_keywords, vec!["dolar"]);
        assert_eq!(cfg.features.realized_vol_window, 10);
        assert_eq!(cfg.features.cds_spike_window, 60);
        assert!(cfg.features.parallel);
        assert_eq!(cfg.index.normalization, NormalizationMethod::ZScorePercentile);
        assert_eq!(cfg.index.weights.len(), 1);
        assert_eq!(cfg.backtest.crash_threshold, -0.03);
        assert_eq!(cfg.backtest.high_fear_threshold, 70.0);
        assert_eq!(cfg.manual_dir, PathBuf::from("/tmp/bifx"));
        assert_eq!(cfg.output_dir, PathBuf::from("out"));
        assert_eq!(cfg.loader_options().cache_days_valid, 3);
    }

    #[test]
    fn non_positive_lookback_rejected() {
        let file = ConfigFile::from_toml("[data]\nlookback_days = 0").unwrap();
        let err = PipelineConfig::resolve(file, today()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn out_of_range_lookback_rejected() {
        let file = ConfigFile::from_toml("[data]\nlookback_days = 9000000000000").unwrap();
        let err = PipelineConfig::resolve(file, today()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(msg) if msg.contains("lookback_days")));
    }

    #[test]
    fn unknown_provider_tag_is_a_parse_error() {
        let toml = r#"
            [[sources]]
            name = "XU100"
            provider = "bloomberg"
            symbol = "XU100"
        "#;
        assert!(matches!(ConfigFile::from_toml(toml), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn inverted_dates_rejected() {
        let toml = "[data]\nstart_date = \"2025-01-01\"\nend_date = \"2024-01-01\"\n";
        let err = PipelineConfig::resolve(ConfigFile::from_toml(toml).unwrap(), today());
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn inverted_fear_thresholds_rejected() {
        let toml = "[backtest]\nlow_fear_threshold = 80.0\nhigh_fear_threshold = 20.0\n";
        let err = PipelineConfig::resolve(ConfigFile::from_toml(toml).unwrap(), today());
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn duplicate_sources_rejected() {
        let toml = r#"
            [[sources]]
            name = "XU100"
            provider = "market-api"
            symbol = "XU100.IS"

            [[sources]]
            name = "XU100"
            provider = "market-api"
            symbol = "XU030.IS"
        "#;
        let err = PipelineConfig::resolve(ConfigFile::from_toml(toml).unwrap(), today());
        assert!(matches!(err, Err(ConfigError::Invalid(msg)) if msg.contains("XU100")));
    }

    #[test]
    fn disabled_reference_source_rejected() {
        let toml = r#"
            [[sources]]
            name = "XU100"
            provider = "market-api"
            symbol = "XU100.IS"
            enabled = false
        "#;
        let err = PipelineConfig::resolve(ConfigFile::from_toml(toml).unwrap(), today());
        assert!(matches!(err, Err(ConfigError::Invalid(msg)) if msg.contains("disabled")));
    }

    #[test]
    fn negative_weight_rejected() {
        let toml = "[index]\nweights = { vix_level = -0.5 }\n";
        let err = PipelineConfig::resolve(ConfigFile::from_toml(toml).unwrap(), today());
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = PipelineConfig::load(Path::new("/nonexistent/bifx.toml"), today()).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/bifx.toml"));
    }
}
