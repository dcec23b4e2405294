//! Positional parser for payroll export rows.
//!
//! The export is a flat comma-separated layout: eleven scalar columns, then a
//! block of concept labels starting at column 11 and a block of amounts
//! starting at column 48. Fields are split on every comma; quotes are
//! stripped rather than interpreted.

use serde::Serialize;

use crate::model::{MAX_CONCEPTS, PayrollRecord, RecordFields};

/// Minimum number of columns for a row to be considered a record.
pub const DEFAULT_MIN_FIELDS: usize = 11;
/// Column where concept labels begin.
pub const CONCEPT_START: usize = 11;
/// Column where concept amounts begin.
pub const AMOUNT_START: usize = 48;

/// Counters describing what the parser did with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    pub lines: usize,
    pub records: usize,
    pub rejected: usize,
    /// Non-empty numeric fields that failed to parse and were read as 0.0.
    pub coerced_numbers: usize,
}

impl ParseStats {
    pub fn merge(&mut self, other: &Self) {
        self.lines += other.lines;
        self.records += other.records;
        self.rejected += other.rejected;
        self.coerced_numbers += other.coerced_numbers;
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RecordParser {
    min_fields: usize,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_FIELDS)
    }
}

impl RecordParser {
    /// A parser requiring at least `min_fields` columns (never fewer than the
    /// eleven scalar columns).
    #[must_use]
    pub fn new(min_fields: usize) -> Self {
        Self {
            min_fields: min_fields.max(DEFAULT_MIN_FIELDS),
        }
    }

    #[must_use]
    pub const fn min_fields(&self) -> usize {
        self.min_fields
    }

    /// Parse one line, or `None` if the line is not a record.
    #[must_use]
    pub fn parse_line(&self, line: &str) -> Option<PayrollRecord> {
        self.parse_line_with_stats(line, &mut ParseStats::default())
    }

    /// Parse one line, accounting the outcome in `stats`.
    pub fn parse_line_with_stats(
        &self,
        line: &str,
        stats: &mut ParseStats,
    ) -> Option<PayrollRecord> {
        stats.lines += 1;

        let columns: Vec<&str> = line.split(',').collect();
        if columns.len() < self.min_fields {
            tracing::trace!(columns = columns.len(), "rejecting short line");
            stats.rejected += 1;
            return None;
        }

        let mut coerced = 0;
        let fields = RecordFields {
            plaza: clean(columns[0]),
            grupo: clean(columns[1]),
            rfc: clean(columns[2]),
            nombre: clean(columns[3]),
            liquido: safe_f64(columns[4], &mut coerced),
            cct: clean(columns[5]),
            cheque: clean(columns[6]),
            puesto_cdc: clean(columns[7]),
            desde_pag: clean(columns[8]),
            hasta_pag: clean(columns[9]),
            motivo: clean(columns[10]),
        };
        let (conceptos, importes) = extract_items(&columns, &mut coerced);

        match PayrollRecord::new(fields, conceptos, importes) {
            Ok(record) => {
                stats.records += 1;
                stats.coerced_numbers += coerced;
                Some(record)
            }
            Err(err) => {
                tracing::debug!(error = %err, "rejecting line");
                stats.rejected += 1;
                None
            }
        }
    }
}

/// Pull `(concepto, importe)` pairs out of the extended region.
///
/// Only concept labels are validated: a pair whose label is blank or the
/// literal `nan` is dropped together with its amount, while amounts are read
/// as-is.
fn extract_items(columns: &[&str], coerced: &mut usize) -> (Vec<String>, Vec<f64>) {
    if columns.len() <= AMOUNT_START {
        return (Vec::new(), Vec::new());
    }

    let pairs = MAX_CONCEPTS.min(columns.len() - AMOUNT_START);
    let mut conceptos = Vec::with_capacity(pairs);
    let mut importes = Vec::with_capacity(pairs);

    for offset in 0..pairs {
        let concepto = clean(columns[CONCEPT_START + offset]);
        if concepto.is_empty() || concepto.eq_ignore_ascii_case("nan") {
            continue;
        }
        conceptos.push(concepto);
        importes.push(safe_f64(columns[AMOUNT_START + offset], coerced));
    }

    (conceptos, importes)
}

fn clean(raw: &str) -> String {
    raw.trim().replace('"', "")
}

fn safe_f64(raw: &str, coerced: &mut usize) -> f64 {
    let cleaned = clean(raw);
    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            if !cleaned.is_empty() {
                *coerced += 1;
            }
            0.0
        }
    }
}
