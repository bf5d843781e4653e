//! BIFX CLI: run the fear index pipeline and inspect its cache.
//!
//! Commands:
//! - `run`: acquire, compute features, synthesize the index, backtest, export
//! - `cache status`: per-source cache age, rows and date span
//! - `features`: list the registered feature units and their weights

use anyhow::{Context, Result};
use bifx_core::data::{CacheStore, Credentials, ProviderSet, SEARCH_INTEREST_SOURCE};
use bifx_core::FeatureRegistry;
use bifx_runner::{
    save_artifacts, ConfigFile, Pipeline, PipelineConfig, PipelineError, PipelineReport,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::SystemTime;

const API_KEY_ENV: &str = "ALPHAVANTAGE_API_KEY";

#[derive(Parser)]
#[command(name = "bifx", about = "BIFX: Borsa Istanbul fear index")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline and write the artifacts.
    Run {
        /// Path to a TOML config file. Built-in defaults when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Use seeded synthetic data instead of the network providers.
        #[arg(long)]
        synthetic: bool,

        /// Seed for --synthetic.
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Start date (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        start: Option<NaiveDate>,

        /// End date (YYYY-MM-DD). Overrides the config.
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Cache directory. Overrides the config.
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Output directory. Overrides the config.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Always fetch from the providers and leave the cache untouched.
        #[arg(long)]
        no_cache: bool,
    },
    /// Cache management.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// List the registered feature units.
    Features {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Report age, row count and date span of every cached source.
    Status {
        #[arg(long)]
        config: Option<PathBuf>,

        /// Cache directory. Overrides the config.
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}

/// Overrides applied to the config file before it is resolved.
#[derive(Default)]
struct Overrides {
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    cache_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    no_cache: bool,
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            synthetic,
            seed,
            start,
            end,
            cache_dir,
            output_dir,
            no_cache,
        } => {
            let overrides = Overrides {
                start,
                end,
                cache_dir,
                output_dir,
                no_cache,
            };
            run_pipeline_cmd(config.as_deref(), overrides, synthetic.then_some(seed))
        }
        Commands::Cache { action } => match action {
            CacheAction::Status { config, cache_dir } => {
                let overrides = Overrides {
                    cache_dir,
                    ..Overrides::default()
                };
                run_cache_status(&load_config(config.as_deref(), overrides)?)?;
                Ok(ExitCode::SUCCESS)
            }
        },
        Commands::Features { config } => {
            run_features(&load_config(config.as_deref(), Overrides::default())?)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>, overrides: Overrides) -> Result<PipelineConfig> {
    let mut file = match path {
        Some(p) => ConfigFile::from_path(p)?,
        None => ConfigFile::default(),
    };
    if overrides.start.is_some() {
        file.data.start_date = overrides.start;
    }
    if overrides.end.is_some() {
        file.data.end_date = overrides.end;
    }
    if let Some(dir) = overrides.cache_dir {
        file.data.cache_dir = dir;
    }
    if let Some(dir) = overrides.output_dir {
        file.output.dir = dir;
    }
    if overrides.no_cache {
        file.data.use_cache = false;
    }
    let today = chrono::Local::now().date_naive();
    Ok(PipelineConfig::resolve(file, today)?)
}

fn run_pipeline_cmd(
    path: Option<&Path>,
    overrides: Overrides,
    synthetic: Option<u64>,
) -> Result<ExitCode> {
    let config = load_config(path, overrides)?;
    let providers = match synthetic {
        Some(seed) => {
            log::warn!("using SYNTHETIC data (seed {seed})");
            ProviderSet::synthetic(seed, &config.manual_dir)
        }
        None => {
            let credentials = Credentials {
                alphavantage: std::env::var(API_KEY_ENV).ok(),
            };
            if credentials.alphavantage_key().is_none() {
                log::warn!("{API_KEY_ENV} is not set; fx-api sources will be unavailable");
            }
            ProviderSet::live(&config.manual_dir, &credentials, config.request_timeout())
                .context("failed to set up data providers")?
        }
    };

    let reference = config.backtest.reference_source.clone();
    let output_dir = config.output_dir.clone();
    let report = match Pipeline::new(config, providers).run() {
        Ok(report) => report,
        Err(err) => return Ok(halted(&err)),
    };

    report.log_summary();
    print_summary(&report);
    let written = save_artifacts(&report, &reference, &output_dir)?;
    for path in written {
        println!("Saved: {}", path.display());
    }
    Ok(ExitCode::SUCCESS)
}

/// A starved pipeline is reported on stderr and fails the process.
fn halted(err: &PipelineError) -> ExitCode {
    eprintln!("{err}");
    ExitCode::FAILURE
}

fn print_summary(report: &PipelineReport) {
    let m = &report.backtest.metrics;
    println!();
    println!("BIFX run {} to {}", m.start_date, m.end_date);
    println!("{}", "-".repeat(44));
    println!("{:<30} {:>12}", "Observations", m.observations);
    println!("{:<30} {:>12}", "Crash days", m.crash_days);
    println!("{:<30} {:>12.4}", "Spearman (next-day |ret|)", m.correlation);
    println!("{:<30} {:>12.4}", "ROC-AUC (crash)", m.roc_auc);
    println!("{:<30} {:>12.4}", "Sharpe market", m.sharpe_market);
    println!("{:<30} {:>12.4}", "Sharpe strategy", m.sharpe_strategy);
    println!("{:<30} {:>11.2}%", "Total return market", m.total_return_market * 100.0);
    println!("{:<30} {:>11.2}%", "Total return strategy", m.total_return_strategy * 100.0);
    if let Some((date, level)) = report
        .synthesis
        .index
        .iter()
        .filter_map(|(d, v)| v.map(|v| (d, v)))
        .last()
    {
        println!("{:<30} {:>12.2}", format!("Fear index ({date})"), level);
    }
    println!("Dataset fingerprint: {}", report.fingerprint);
    println!();
}

fn run_cache_status(config: &PipelineConfig) -> Result<()> {
    let cache = CacheStore::new(config.cache_dir.clone());
    if !cache.cache_dir().exists() {
        println!("Cache directory does not exist: {}", cache.cache_dir().display());
        return Ok(());
    }

    let mut names: Vec<String> = config.catalog.sources.iter().map(|s| s.name.clone()).collect();
    if !config.catalog.search_keywords.is_empty() {
        names.push(SEARCH_INTEREST_SOURCE.to_string());
    }
    for extra in cache.cached_sources() {
        if !names.contains(&extra) {
            names.push(extra);
        }
    }
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();

    println!("Cache: {}", cache.cache_dir().display());
    println!("Validity window: {} day(s)", config.cache_days_valid);
    println!();
    println!("{:<14} {:<8} {:>8} {:>8}  {:<25}", "Source", "State", "Age", "Rows", "Date Range");
    println!("{}", "-".repeat(68));
    let now = SystemTime::now();
    for status in cache.status(&refs) {
        let state = if !status.cached {
            "missing"
        } else if cache.is_fresh(&status.source, config.cache_days_valid, now) {
            "fresh"
        } else {
            "stale"
        };
        let age = status.age_days.map(|a| format!("{a}d")).unwrap_or_default();
        let rows = status.row_count.map(|r| r.to_string()).unwrap_or_default();
        let range = match (status.start_date, status.end_date) {
            (Some(s), Some(e)) => format!("{s} to {e}"),
            _ => String::new(),
        };
        println!("{:<14} {:<8} {:>8} {:>8}  {:<25}", status.source, state, age, rows, range);
    }
    Ok(())
}

fn run_features(config: &PipelineConfig) -> Result<()> {
    let registry = FeatureRegistry::builtin(&config.features);
    println!("{:<24} {:>8}", "Feature", "Weight");
    println!("{}", "-".repeat(33));
    for name in registry.names() {
        let weight = config.index.weights.get(name).copied().unwrap_or(0.0);
        println!("{name:<24} {weight:>8.2}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bifx_runner::Stage;

    #[test]
    fn halted_run_fails_the_process() {
        let err = PipelineError::Starved {
            stage: Stage::Acquisition,
            cause: "no source returned any data".into(),
        };
        assert_eq!(format!("{:?}", halted(&err)), format!("{:?}", ExitCode::FAILURE));
    }

    #[test]
    fn overrides_replace_file_values() {
        let dir = std::env::temp_dir();
        let overrides = Overrides {
            start: NaiveDate::from_ymd_opt(2024, 1, 2),
            end: NaiveDate::from_ymd_opt(2024, 3, 29),
            cache_dir: Some(dir.join("bifx_cache")),
            output_dir: Some(dir.join("bifx_out")),
            no_cache: true,
        };
        let config = load_config(None, overrides).unwrap();
        assert_eq!(config.range.start, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(config.range.end, NaiveDate::from_ymd_opt(2024, 3, 29).unwrap());
        assert_eq!(config.cache_dir, dir.join("bifx_cache"));
        assert_eq!(config.output_dir, dir.join("bifx_out"));
        assert!(!config.use_cache);
    }
}
