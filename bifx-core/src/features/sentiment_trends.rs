//! Search-interest sentiment.
//!
//! Mean across all keyword columns of the joint search-interest table, then a
//! rolling z-score. More searches for crisis keywords reads as more fear.

use super::{FeatureError, FeatureUnit};
use crate::data::{DatasetBundle, SEARCH_INTEREST_SOURCE};
use crate::series::Series;

pub const NAME: &str = "sentiment_trends";

#[derive(Debug, Clone)]
pub struct SentimentTrends {
    window: usize,
}

impl SentimentTrends {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl FeatureUnit for SentimentTrends {
    fn name(&self) -> &str {
        NAME
    }

    fn compute(&self, bundle: &DatasetBundle) -> Result<Series, FeatureError> {
        let Some(table) = bundle.get(SEARCH_INTEREST_SOURCE) else {
            return Ok(Series::empty(NAME));
        };
        Ok(table.row_mean(NAME).rolling_zscore(self.window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::day;
    use crate::series::TimeSeriesTable;

    #[test]
    fn averages_keywords_before_scoring() {
        let rows = (0..12)
            .map(|i| {
                let base = 40.0 + (i % 4) as f64;
                (day(i * 7), vec![Some(base), Some(base + 10.0)])
            })
            .collect();
        let table = TimeSeriesTable::from_rows(&["dolar", "faiz"], rows).unwrap();
        let mut bundle = DatasetBundle::new();
        bundle.insert(SEARCH_INTEREST_SOURCE, table);

        let out = SentimentTrends::new(4).compute(&bundle).unwrap();
        assert_eq!(out.len(), 12);
        assert_eq!(out.valid_count(), 9);
    }
}
