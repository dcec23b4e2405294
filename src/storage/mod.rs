//! Durable storage for payroll records.

pub mod sqlite;

pub use sqlite::{InsertReport, PayrollStore, SeedOutcome, StoredRecord};
