//! Ingestion of payroll exports: decoding, parsing and bulk loading.

pub mod encoding;
pub mod loader;
pub mod parser;

pub use encoding::TextEncoding;
pub use loader::{BulkLoader, LoadMode, LoadReport, RecordSink};
pub use parser::{ParseStats, RecordParser};
