//! Correlation breakdown between the local index and the S&P 500.
//!
//! `1 - rolling_corr(returns_xu100, returns_sp500)` on common trading days.
//! Decoupling from global markets reads as local stress. Needs at least
//! `window` common return dates, otherwise the signal is unavailable.

use super::{close_of, FeatureError, FeatureUnit};
use crate::data::DatasetBundle;
use crate::series::Series;

pub const NAME: &str = "correlation_breakdown";
const LOCAL: &str = "XU100";
const GLOBAL: &str = "SP500";

#[derive(Debug, Clone)]
pub struct CorrelationBreakdown {
    window: usize,
}

impl CorrelationBreakdown {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl FeatureUnit for CorrelationBreakdown {
    fn name(&self) -> &str {
        NAME
    }

    fn compute(&self, bundle: &DatasetBundle) -> Result<Series, FeatureError> {
        let (Some(local), Some(global)) = (bundle.get(LOCAL), bundle.get(GLOBAL)) else {
            return Ok(Series::empty(NAME));
        };
        let local = close_of(LOCAL, local)?.pct_change().drop_missing();
        let global = close_of(GLOBAL, global)?.pct_change().drop_missing();
        let (local, global) = local.intersect(&global);
        if local.len() < self.window {
            log::debug!(
                "{NAME}: {} common dates, need {}",
                local.len(),
                self.window
            );
            return Ok(Series::empty(NAME));
        }

        let corr = local.rolling_corr(&global, self.window).ok_or_else(|| {
            FeatureError::Computation("return series not aligned after intersection".into())
        })?;
        Ok(corr.map(|c| 1.0 - c).rename(NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{bundle, close_table};

    fn walk(n: usize, seed: u64) -> Vec<f64> {
        let mut price = 100.0;
        (0..n)
            .map(|i| {
                let step = (((i as u64 + 1) * 2654435761 + seed) % 1000) as f64 / 1000.0 - 0.5;
                price *= 1.0 + step * 0.02;
                price
            })
            .collect()
    }

    #[test]
    fn identical_markets_have_no_breakdown() {
        let closes = walk(80, 3);
        let out = CorrelationBreakdown::new(20)
            .compute(&bundle(vec![
                ("XU100", close_table(&closes)),
                ("SP500", close_table(&closes)),
            ]))
            .unwrap();
        assert!(!out.is_empty());
        assert!(out.valid_values().iter().all(|v| v.abs() < 1e-9));
    }

    #[test]
    fn too_few_common_dates_is_unavailable() {
        let out = CorrelationBreakdown::new(60)
            .compute(&bundle(vec![
                ("XU100", close_table(&walk(30, 1))),
                ("SP500", close_table(&walk(30, 2))),
            ]))
            .unwrap();
        assert!(out.is_empty());
    }
}
