//! Per-column robust scaling onto the target index range.
//!
//! Parameters are estimated from the present values only. A column is
//! excluded (never partially scaled) when it is entirely missing, has fewer
//! than `MIN_OBSERVATIONS` present values, has zero variance, or its 1st and
//! 99th percentile coincide.

use crate::features::FeatureMatrix;
use crate::series::{mean, sample_std, Series, TableColumn};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MIN_OBSERVATIONS: usize = 10;
pub const LOWER_QUANTILE: f64 = 0.01;
pub const UPPER_QUANTILE: f64 = 0.99;

const ZERO_VARIANCE: f64 = 1e-15;

/// How raw feature values are mapped onto `[min_value, max_value]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationMethod {
    /// Clip at the 1st/99th percentile of the raw values, then rescale linearly.
    #[default]
    #[serde(alias = "zscore_minmax")]
    RobustPercentile,
    /// Z-score first, then clip at the 1st/99th percentile of the z-scores.
    #[serde(rename = "zscore_percentile")]
    ZScorePercentile,
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationMethod::RobustPercentile => write!(f, "robust_percentile"),
            NormalizationMethod::ZScorePercentile => write!(f, "zscore_percentile"),
        }
    }
}

/// Why a column was left out of the index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExclusionReason {
    AllMissing,
    TooFewObservations(usize),
    ZeroVariance,
    DegenerateRange,
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::AllMissing => write!(f, "all values missing"),
            ExclusionReason::TooFewObservations(n) => {
                write!(f, "only {n} valid values (need {MIN_OBSERVATIONS})")
            }
            ExclusionReason::ZeroVariance => write!(f, "zero variance"),
            ExclusionReason::DegenerateRange => write!(f, "1st and 99th percentile coincide"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub column: String,
    pub reason: ExclusionReason,
}

/// Quantile with linear interpolation between order statistics.
///
/// `sorted` must be ascending and non-empty.
pub fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Scale one column. `Err` carries the exclusion reason.
pub fn normalize_series(
    series: &Series,
    method: NormalizationMethod,
    min_value: f64,
    max_value: f64,
) -> Result<Series, ExclusionReason> {
    let valid = series.valid_values();
    if valid.is_empty() {
        return Err(ExclusionReason::AllMissing);
    }
    if valid.len() < MIN_OBSERVATIONS {
        return Err(ExclusionReason::TooFewObservations(valid.len()));
    }
    let (lowest, highest) = valid
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(*v), hi.max(*v)));
    let std = match sample_std(&valid) {
        Some(s) if highest > lowest && s > ZERO_VARIANCE => s,
        _ => return Err(ExclusionReason::ZeroVariance),
    };

    let (transform, mut basis): (Box<dyn Fn(f64) -> f64>, Vec<f64>) = match method {
        NormalizationMethod::RobustPercentile => (Box::new(|x: f64| x), valid),
        NormalizationMethod::ZScorePercentile => {
            let m = mean(&valid);
            let z = move |x: f64| (x - m) / std;
            let zs = valid.iter().map(|x| z(*x)).collect();
            (Box::new(z), zs)
        }
    };
    basis.sort_by(f64::total_cmp);
    let lower = quantile(&basis, LOWER_QUANTILE);
    let upper = quantile(&basis, UPPER_QUANTILE);
    let span = upper - lower;
    if span <= ZERO_VARIANCE {
        return Err(ExclusionReason::DegenerateRange);
    }

    let width = max_value - min_value;
    Ok(series.map(|x| {
        let unit = ((transform(x) - lower) / span).clamp(0.0, 1.0);
        (min_value + unit * width).clamp(min_value, max_value)
    }))
}

/// Scale every column; excluded columns are dropped from the result.
pub fn normalize_matrix(
    matrix: &FeatureMatrix,
    method: NormalizationMethod,
    min_value: f64,
    max_value: f64,
) -> (FeatureMatrix, Vec<Exclusion>) {
    let mut kept: Vec<TableColumn> = Vec::new();
    let mut excluded = Vec::new();
    for series in matrix.series() {
        match normalize_series(&series, method, min_value, max_value) {
            Ok(scaled) => kept.push(TableColumn {
                name: scaled.name,
                values: scaled.values,
            }),
            Err(reason) => {
                log::warn!("excluding feature {} from normalization: {reason}", series.name);
                excluded.push(Exclusion {
                    column: series.name,
                    reason,
                });
            }
        }
    }
    (FeatureMatrix::from_columns(matrix.dates().to_vec(), kept), excluded)
}
