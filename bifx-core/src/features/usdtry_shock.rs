//! FX shock: rolling z-score of the absolute daily USD/TRY change.

use super::{close_of, FeatureError, FeatureUnit};
use crate::data::DatasetBundle;
use crate::series::Series;

pub const NAME: &str = "usdtry_shock";
const SOURCE: &str = "USDTRY";

#[derive(Debug, Clone)]
pub struct UsdTryShock {
    window: usize,
}

impl UsdTryShock {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl FeatureUnit for UsdTryShock {
    fn name(&self) -> &str {
        NAME
    }

    fn compute(&self, bundle: &DatasetBundle) -> Result<Series, FeatureError> {
        let Some(table) = bundle.get(SOURCE) else {
            return Ok(Series::empty(NAME));
        };
        let change = close_of(SOURCE, table)?.diff().abs();
        Ok(change.rolling_zscore(self.window).rename(NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{bundle, close_table};

    #[test]
    fn jump_stands_out() {
        // alternating small moves, then one large jump
        let mut closes: Vec<f64> = (0..30).map(|i| 30.0 + (i % 2) as f64 * 0.1).collect();
        closes.push(33.0);
        let out = UsdTryShock::new(10)
            .compute(&bundle(vec![("USDTRY", close_table(&closes))]))
            .unwrap();
        let last = out.values.last().copied().flatten().unwrap();
        assert!(last > 2.0, "last z-score {last}");
    }

    #[test]
    fn unavailable_without_source() {
        assert!(UsdTryShock::new(10).compute(&bundle(vec![])).unwrap().is_empty());
    }
}
