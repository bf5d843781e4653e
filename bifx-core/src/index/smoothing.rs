//! Exponential smoothing of the raw composite.
//!
//! Recursive: EMA[t] = EMA[t-1] + alpha * (raw[t] - EMA[t-1]), alpha = 2/(span+1).
//! Seed: the first present raw value (no bias adjustment).
//! A missing raw value produces no output point and leaves the state untouched.

use crate::series::Series;

/// Smooth `series`; the output holds only dates with a present raw value.
pub fn ema(series: &Series, span: usize) -> Series {
    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut dates = Vec::with_capacity(series.len());
    let mut values = Vec::with_capacity(series.len());
    let mut prev: Option<f64> = None;

    for (date, raw) in series.iter() {
        let Some(raw) = raw else { continue };
        let next = match prev {
            None => raw,
            Some(p) => p + alpha * (raw - p),
        };
        dates.push(date);
        values.push(Some(next));
        prev = Some(next);
    }

    Series {
        name: series.name.clone(),
        dates,
        values,
    }
}
