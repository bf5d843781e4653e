//! Sovereign CDS spike: rolling z-score of the CDS level.
//!
//! Manual CDS files carry a `Value` column; market-style tables carry
//! `Close`. Anything else falls back to the first column.

use super::{FeatureError, FeatureUnit};
use crate::data::DatasetBundle;
use crate::series::Series;

pub const NAME: &str = "cds_spike";
const SOURCE: &str = "CDS";

#[derive(Debug, Clone)]
pub struct CdsSpike {
    window: usize,
}

impl CdsSpike {
    pub fn new(window: usize) -> Self {
        Self { window }
    }
}

impl FeatureUnit for CdsSpike {
    fn name(&self) -> &str {
        NAME
    }

    fn compute(&self, bundle: &DatasetBundle) -> Result<Series, FeatureError> {
        let Some(table) = bundle.get(SOURCE) else {
            return Ok(Series::empty(NAME));
        };
        let level = table
            .column("Value")
            .or_else(|| table.close())
            .or_else(|| table.first_column())
            .ok_or_else(|| FeatureError::MissingColumn {
                source_name: SOURCE.to_string(),
                column: "Value".to_string(),
            })?;
        Ok(level.rolling_zscore(self.window).rename(NAME))
    }
}
