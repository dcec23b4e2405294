//! Payroll domain types.

pub mod record;

pub use record::{MAX_CONCEPTS, PayrollRecord, RecordFields, RecordId};
