//! nomina - payroll export ingestion, indexing and search.
//!
//! Sources are decoded and parsed by [`ingest`], indexed in memory by
//! [`search`], and optionally persisted by [`storage`] or mirrored through
//! [`remote`].

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod ingest;
pub mod model;
pub mod remote;
pub mod search;
pub mod storage;
pub mod test_utils;
pub mod utils;

pub use error::{NominaError, Result};
