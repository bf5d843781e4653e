//! BIFX Core: acquisition, feature computation and composite index synthesis.
//!
//! This crate contains the first three stages of the fear index pipeline:
//! - Time series primitives with explicit missing values
//! - Source catalog, provider adapters and the parquet cache
//! - Cache-first data loader producing a dataset bundle
//! - Feature registry with per-unit isolation and six built-in fear signals
//! - Index synthesizer (robust scaling, weighted aggregation, smoothing)

pub mod data;
pub mod features;
pub mod index;
pub mod series;

pub use data::{DatasetBundle, DateRange, SourceCatalog};
pub use features::{FeatureMatrix, FeatureRegistry, FeatureUnit};
pub use index::{synthesize, IndexConfig};
pub use series::{Series, TimeSeriesTable};
