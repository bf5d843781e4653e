//! Backtest evaluator: scores the composite index against realized market moves.
//!
//! 1. Inner-join the index with the reference close on date; derive the daily
//!    return, its absolute value, and both shifted one step ahead. Rows with
//!    any missing derivation are dropped.
//! 2. Spearman rank correlation: index level vs next-day absolute return.
//! 3. ROC-AUC of the index as a crash-day predictor (next-day return below
//!    `crash_threshold`).
//! 4. Overlay strategy: exposure from the three-zone rule times the market
//!    return; cumulative curves and annualized Sharpe for market and strategy.

use bifx_core::series::Series;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::metrics::{cumulative_growth, pearson, roc_auc, sharpe_ratio, spearman, total_return};

/// Minimum number of crash days for a meaningful ROC-AUC.
pub const MIN_CRASH_DAYS: usize = 2;

#[derive(Debug, Error, PartialEq)]
pub enum BacktestError {
    #[error("index and reference share no usable dates (empty merge)")]
    EmptyMerge,

    #[error("invalid backtest configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Source whose close is the market being protected.
    pub reference_source: String,
    /// Next-day return below this marks a crash day.
    pub crash_threshold: f64,
    pub high_fear_threshold: f64,
    pub low_fear_threshold: f64,
    /// Annual rate, spread evenly over 252 periods.
    pub risk_free_rate: f64,
    pub rolling_corr_window: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            reference_source: "XU100".to_string(),
            crash_threshold: -0.02,
            high_fear_threshold: 70.0,
            low_fear_threshold: 30.0,
            risk_free_rate: 0.0,
            rolling_corr_window: 60,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        let (low, high) = (self.low_fear_threshold, self.high_fear_threshold);
        if !(low.is_finite() && high.is_finite()) || low >= high {
            return Err(BacktestError::InvalidConfig(format!(
                "low_fear_threshold {low} must be below high_fear_threshold {high}"
            )));
        }
        if !self.crash_threshold.is_finite() {
            return Err(BacktestError::InvalidConfig("crash_threshold must be finite".into()));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(BacktestError::InvalidConfig("risk_free_rate must be finite".into()));
        }
        if self.rolling_corr_window < 2 {
            return Err(BacktestError::InvalidConfig(
                "rolling_corr_window must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

/// Market exposure for an index level.
///
/// Full exposure below `low`, none above `high`, linear in between:
/// `1 - (level - low) / (high - low)`.
pub fn exposure(level: f64, low: f64, high: f64) -> f64 {
    if level > high {
        0.0
    } else if level < low {
        1.0
    } else {
        1.0 - (level - low) / (high - low)
    }
}

/// One row of the merged analysis table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRow {
    pub date: NaiveDate,
    pub fear_index: f64,
    pub close: f64,
    pub market_return: f64,
    pub abs_return: f64,
    pub next_day_return: f64,
    pub next_day_abs_return: f64,
    pub crash_day: bool,
    pub exposure: f64,
    pub strategy_return: f64,
    pub market_cumulative: f64,
    pub strategy_cumulative: f64,
    /// Rolling correlation of index vs next-day absolute return.
    pub rolling_corr: Option<f64>,
}

/// Headline numbers of one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub correlation: f64,
    pub roc_auc: f64,
    pub sharpe_market: f64,
    pub sharpe_strategy: f64,
    pub total_return_market: f64,
    pub total_return_strategy: f64,
    pub observations: usize,
    pub crash_days: usize,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub metrics: BacktestMetrics,
    pub rows: Vec<AnalysisRow>,
}

/// Score `index` against the reference closing price series.
pub fn evaluate(
    index: &Series,
    reference_close: &Series,
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    config.validate()?;
    log::info!("starting backtest against {}", config.reference_source);

    let merged = merge(index, reference_close);
    if merged.is_empty() {
        log::error!("cannot run backtest: merged data is empty");
        return Err(BacktestError::EmptyMerge);
    }
    log::info!("merged data: {} rows", merged.len());

    let levels: Vec<f64> = merged.iter().map(|m| m.level).collect();
    let next_abs: Vec<f64> = merged.iter().map(|m| m.next_return.abs()).collect();
    let correlation = spearman(&levels, &next_abs).unwrap_or_else(|| {
        log::warn!("Spearman correlation undefined (constant input), reporting 0");
        0.0
    });
    log::info!("Spearman correlation: {correlation:.4}");

    let crashes: Vec<bool> = merged
        .iter()
        .map(|m| m.next_return < config.crash_threshold)
        .collect();
    let crash_days = crashes.iter().filter(|c| **c).count();
    let auc = if crash_days < MIN_CRASH_DAYS {
        log::warn!("insufficient crash days for ROC-AUC ({crash_days}), reporting 0");
        0.0
    } else {
        roc_auc(&levels, &crashes).unwrap_or_else(|| {
            log::warn!("no non-crash days for ROC-AUC, reporting 0");
            0.0
        })
    };
    log::info!(
        "ROC-AUC: {auc:.4} (crash days: {crash_days}, threshold {:.1}%)",
        config.crash_threshold * 100.0
    );

    let (low, high) = (config.low_fear_threshold, config.high_fear_threshold);
    let market: Vec<f64> = merged.iter().map(|m| m.market_return).collect();
    let exposures: Vec<f64> = levels.iter().map(|l| exposure(*l, low, high)).collect();
    let strategy: Vec<f64> = exposures.iter().zip(&market).map(|(e, r)| e * r).collect();
    let market_curve = cumulative_growth(&market);
    let strategy_curve = cumulative_growth(&strategy);

    let sharpe_market = sharpe_ratio(&market, config.risk_free_rate);
    let sharpe_strategy = sharpe_ratio(&strategy, config.risk_free_rate);
    let total_return_market = total_return(&market);
    let total_return_strategy = total_return(&strategy);
    log::info!("market Sharpe: {sharpe_market:.4}, strategy Sharpe: {sharpe_strategy:.4}");
    log::info!(
        "market return: {:.2}%, strategy return: {:.2}%",
        total_return_market * 100.0,
        total_return_strategy * 100.0
    );

    let rolling = rolling_pearson(&levels, &next_abs, config.rolling_corr_window);
    let rows = merged
        .iter()
        .enumerate()
        .map(|(i, m)| AnalysisRow {
            date: m.date,
            fear_index: m.level,
            close: m.close,
            market_return: m.market_return,
            abs_return: m.market_return.abs(),
            next_day_return: m.next_return,
            next_day_abs_return: next_abs[i],
            crash_day: crashes[i],
            exposure: exposures[i],
            strategy_return: strategy[i],
            market_cumulative: market_curve[i],
            strategy_cumulative: strategy_curve[i],
            rolling_corr: rolling[i],
        })
        .collect::<Vec<_>>();

    let metrics = BacktestMetrics {
        correlation,
        roc_auc: auc,
        sharpe_market,
        sharpe_strategy,
        total_return_market,
        total_return_strategy,
        observations: rows.len(),
        crash_days,
        start_date: merged[0].date,
        end_date: merged[merged.len() - 1].date,
    };
    log::info!("backtest complete");
    Ok(BacktestResult { metrics, rows })
}

struct Merged {
    date: NaiveDate,
    level: f64,
    close: f64,
    market_return: f64,
    next_return: f64,
}

/// Inner join, returns on joined rows, one-step look-ahead, drop incomplete rows.
fn merge(index: &Series, reference_close: &Series) -> Vec<Merged> {
    let (levels, closes) = index.intersect(reference_close);
    let returns = closes.pct_change();
    let n = levels.len();

    (0..n)
        .filter_map(|i| {
            let next_return = if i + 1 < n { returns.values[i + 1] } else { None };
            Some(Merged {
                date: levels.dates[i],
                level: levels.values[i]?,
                close: closes.values[i]?,
                market_return: returns.values[i]?,
                next_return: next_return?,
            })
        })
        .collect()
}

fn rolling_pearson(x: &[f64], y: &[f64], window: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; x.len()];
    if window >= 2 {
        for end in window..=x.len() {
            out[end - 1] = pearson(&x[end - window..end], &y[end - window..end]);
        }
    }
    out
}
