//! Realized volatility of the main equity index.
//!
//! Rolling sample std of close-to-close returns over `window` days,
//! annualized with √252.

use super::{close_of, FeatureError, FeatureUnit, TRADING_DAYS_PER_YEAR};
use crate::data::DatasetBundle;
use crate::series::Series;

pub const NAME: &str = "realized_vol";

#[derive(Debug, Clone)]
pub struct RealizedVol {
    source: String,
    window: usize,
}

impl RealizedVol {
    pub fn new(window: usize) -> Self {
        Self::on_source("XU100", window)
    }

    /// Same computation over another source.
    pub fn on_source(source: impl Into<String>, window: usize) -> Self {
        Self {
            source: source.into(),
            window,
        }
    }
}

impl FeatureUnit for RealizedVol {
    fn name(&self) -> &str {
        NAME
    }

    fn compute(&self, bundle: &DatasetBundle) -> Result<Series, FeatureError> {
        let Some(table) = bundle.get(&self.source) else {
            return Ok(Series::empty(NAME));
        };
        let returns = close_of(&self.source, table)?.pct_change();
        Ok(returns
            .rolling_std(self.window)
            .map(|s| s * TRADING_DAYS_PER_YEAR.sqrt())
            .rename(NAME))
    }
}
