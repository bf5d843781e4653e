//! Global fear gauge: the VIX close, as is.

use super::{close_of, FeatureError, FeatureUnit};
use crate::data::DatasetBundle;
use crate::series::Series;

pub const NAME: &str = "vix_level";
const SOURCE: &str = "VIX";

#[derive(Debug, Clone, Default)]
pub struct VixLevel;

impl FeatureUnit for VixLevel {
    fn name(&self) -> &str {
        NAME
    }

    fn compute(&self, bundle: &DatasetBundle) -> Result<Series, FeatureError> {
        match bundle.get(SOURCE) {
            Some(table) => Ok(close_of(SOURCE, table)?.rename(NAME)),
            None => Ok(Series::empty(NAME)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::test_support::{bundle, close_table};

    #[test]
    fn passes_close_through() {
        let out = VixLevel
            .compute(&bundle(vec![("VIX", close_table(&[14.0, 18.5]))]))
            .unwrap();
        assert_eq!(out.values, vec![Some(14.0), Some(18.5)]);
        assert_eq!(out.name, NAME);
    }
}
