//! Data acquisition, caching and provider adapters

pub mod alphavantage;
pub mod bundle;
pub mod cache;
pub mod catalog;
pub mod http;
pub mod loader;
pub mod manual;
pub mod provider;
pub mod synthetic;
pub mod trends;
pub mod yahoo;

pub use bundle::DatasetBundle;
pub use cache::{CacheMeta, CacheStatus, CacheStore};
pub use catalog::{DateRange, ProviderKind, SourceCatalog, SourceDescriptor, SEARCH_INTEREST_SOURCE};
pub use loader::{DataLoader, LoadOrigin, LoaderOptions, ProviderSet};
pub use provider::{Credentials, DataError, DataProvider, KeywordProvider};
pub use synthetic::SyntheticProvider;
