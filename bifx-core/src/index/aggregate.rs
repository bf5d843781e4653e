//! Weighted aggregation with per-date weight reallocation.
//!
//! On each date the composite is `Σ wᵢ·xᵢ / Σ wᵢ` over the features present on
//! that date. A missing feature's weight is spread proportionally over the
//! others instead of pulling the composite towards zero. A date where no
//! weighted feature is present stays missing.

use crate::features::FeatureMatrix;
use crate::series::Series;
use std::collections::BTreeMap;

/// Per-date weighted average of the matrix columns.
///
/// Columns without a positive, finite weight do not contribute.
pub fn weighted_composite(
    matrix: &FeatureMatrix,
    weights: &BTreeMap<String, f64>,
    name: &str,
) -> Series {
    let weighted: Vec<(&[Option<f64>], f64)> = matrix
        .columns()
        .iter()
        .filter_map(|c| match weights.get(&c.name) {
            Some(w) if w.is_finite() && *w > 0.0 => Some((c.values.as_slice(), *w)),
            _ => {
                log::debug!("feature {} has no weight, not aggregated", c.name);
                None
            }
        })
        .collect();

    let values = (0..matrix.len())
        .map(|i| {
            let mut weighted_sum = 0.0;
            let mut weight_used = 0.0;
            for (values, w) in &weighted {
                if let Some(x) = values[i] {
                    weighted_sum += x * w;
                    weight_used += w;
                }
            }
            (weight_used > 0.0).then(|| weighted_sum / weight_used)
        })
        .collect();

    Series {
        name: name.to_string(),
        dates: matrix.dates().to_vec(),
        values,
    }
}
