//! Artifact export: the index CSV, backtest metrics JSON and analysis CSV.
//!
//! File names are fixed so that consecutive runs overwrite each other:
//! - `bifx_fear_index.csv`: `date,fear_index`
//! - `bifx_metrics.json`: the headline backtest metrics plus the run fingerprint
//! - `bifx_analysis.csv`: the merged per-day backtest table

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bifx_core::index::INDEX_NAME;
use bifx_core::Series;
use serde::Serialize;

use crate::backtest::{AnalysisRow, BacktestMetrics};
use crate::pipeline::PipelineReport;

pub const INDEX_FILE: &str = "bifx_fear_index.csv";
pub const METRICS_FILE: &str = "bifx_metrics.json";
pub const ANALYSIS_FILE: &str = "bifx_analysis.csv";

/// Composite index as two-column CSV. Dates without a value are skipped.
pub fn export_index_csv(index: &Series) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["date", INDEX_NAME])?;
    for (date, value) in index.iter() {
        if let Some(v) = value {
            wtr.write_record([date.to_string(), format!("{v:.6}")])?;
        }
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

#[derive(Serialize)]
struct MetricsDocument<'a> {
    fingerprint: &'a str,
    reference_source: &'a str,
    #[serde(flatten)]
    metrics: &'a BacktestMetrics,
}

pub fn export_metrics_json(
    metrics: &BacktestMetrics,
    fingerprint: &str,
    reference_source: &str,
) -> Result<String> {
    let doc = MetricsDocument {
        fingerprint,
        reference_source,
        metrics,
    };
    serde_json::to_string_pretty(&doc).context("failed to serialize backtest metrics to JSON")
}

/// Per-day analysis table. An undefined rolling correlation is an empty cell.
pub fn export_analysis_csv(rows: &[AnalysisRow]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "date",
        "fear_index",
        "close",
        "return",
        "abs_return",
        "next_day_return",
        "next_day_abs_return",
        "crash_day",
        "exposure",
        "strategy_return",
        "market_cumulative",
        "strategy_cumulative",
        "rolling_corr",
    ])?;

    for r in rows {
        wtr.write_record([
            r.date.to_string(),
            format!("{:.6}", r.fear_index),
            format!("{:.6}", r.close),
            format!("{:.8}", r.market_return),
            format!("{:.8}", r.abs_return),
            format!("{:.8}", r.next_day_return),
            format!("{:.8}", r.next_day_abs_return),
            r.crash_day.to_string(),
            format!("{:.6}", r.exposure),
            format!("{:.8}", r.strategy_return),
            format!("{:.8}", r.market_cumulative),
            format!("{:.8}", r.strategy_cumulative),
            r.rolling_corr.map(|c| format!("{c:.6}")).unwrap_or_default(),
        ])?;
    }

    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Write all artifacts of a run into `output_dir`, creating it if needed.
///
/// Returns the paths written, index file first.
pub fn save_artifacts(
    report: &PipelineReport,
    reference_source: &str,
    output_dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create output dir: {}", output_dir.display()))?;

    let files = [
        (INDEX_FILE, export_index_csv(&report.synthesis.index)?),
        (
            METRICS_FILE,
            export_metrics_json(&report.backtest.metrics, &report.fingerprint, reference_source)?,
        ),
        (ANALYSIS_FILE, export_analysis_csv(&report.backtest.rows)?),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, content) in files {
        let path = output_dir.join(name);
        std::fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("saved {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    #[test]
    fn index_csv_skips_missing_dates() {
        let index = Series::new(
            INDEX_NAME,
            vec![d(1), d(2), d(3)],
            vec![Some(12.5), None, Some(80.0)],
        )
        .unwrap();
        let csv = export_index_csv(&index).unwrap();
        assert_eq!(
            csv,
            "date,fear_index\n2024-05-01,12.500000\n2024-05-03,80.000000\n"
        );
    }

    #[test]
    fn metrics_json_is_flat() {
        let metrics = BacktestMetrics {
            correlation: 0.1,
            roc_auc: 0.6,
            sharpe_market: 0.5,
            sharpe_strategy: 0.7,
            total_return_market: 0.12,
            total_return_strategy: 0.08,
            observations: 250,
            crash_days: 9,
            start_date: d(1),
            end_date: d(31),
        };
        let json = export_metrics_json(&metrics, "abc123", "XU100").unwrap();
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["fingerprint"], "abc123");
        assert_eq!(v["reference_source"], "XU100");
        assert_eq!(v["crash_days"], 9);
        assert_eq!(v["start_date"], "2024-05-01");
    }

    #[test]
    fn analysis_csv_leaves_undefined_correlation_blank() {
        let row = AnalysisRow {
            date: d(2),
            fear_index: 40.0,
            close: 101.0,
            market_return: 0.01,
            abs_return: 0.01,
            next_day_return: -0.03,
            next_day_abs_return: 0.03,
            crash_day: true,
            exposure: 0.75,
            strategy_return: 0.0075,
            market_cumulative: 1.01,
            strategy_cumulative: 1.0075,
            rolling_corr: None,
        };
        let csv = export_analysis_csv(&[row]).unwrap();
        let line = csv.lines().nth(1).unwrap();
        assert!(line.starts_with("2024-05-02,40.000000,"));
        assert!(line.ends_with(",true,0.750000,0.00750000,1.01000000,1.00750000,"));
    }
}
