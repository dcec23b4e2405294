//! Search over loaded payroll records.
//!
//! - [`index`]: immutable RFC and name-token posting maps
//! - [`cache`]: bounded recency cache for query results
//! - [`engine`]: readiness, atomic index swaps and cached queries

pub mod cache;
pub mod engine;
pub mod index;

pub use cache::{CacheStats, DEFAULT_CACHE_CAPACITY, RecencyCache};
pub use engine::{
    IndexSnapshot, IndexState, LookupOutcome, QueryKind, SearchEngine, SearchOutcome,
};
pub use index::{IndexBuilder, MIN_PARTIAL_RFC_LEN, SearchIndex};
