//! In-memory inverted indexes over a loaded record set.
//!
//! Two posting maps point into a positional record vector:
//! - uppercased RFC -> positions
//! - uppercased name token -> positions
//!
//! Positions are kept in [`RoaringBitmap`]s so unions and intersections come
//! back in arrival order. An index is immutable; a reload builds a new one.

use std::collections::HashMap;
use std::sync::Arc;

use roaring::RoaringBitmap;

use crate::error::{NominaError, Result};
use crate::model::PayrollRecord;

/// Shortest query that may fall back to substring RFC matching.
pub const MIN_PARTIAL_RFC_LEN: usize = 4;

/// Single-pass builder; positions follow insertion order.
#[derive(Default)]
pub struct IndexBuilder {
    records: Vec<Arc<PayrollRecord>>,
    rfc_index: HashMap<String, RoaringBitmap>,
    name_index: HashMap<String, RoaringBitmap>,
}

impl IndexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(records: usize) -> Self {
        Self {
            records: Vec::with_capacity(records),
            rfc_index: HashMap::with_capacity(records),
            name_index: HashMap::new(),
        }
    }

    pub fn add(&mut self, record: PayrollRecord) -> Result<()> {
        let position = u32::try_from(self.records.len()).map_err(|_| {
            NominaError::IndexUnavailable("record count exceeds index capacity".to_string())
        })?;

        self.rfc_index
            .entry(record.rfc().to_uppercase())
            .or_default()
            .insert(position);

        for token in record.nombre().to_uppercase().split_whitespace() {
            self.name_index
                .entry(token.to_string())
                .or_default()
                .insert(position);
        }

        self.records.push(Arc::new(record));
        Ok(())
    }

    #[must_use]
    pub fn finish(self) -> SearchIndex {
        SearchIndex {
            records: self.records,
            rfc_index: self.rfc_index,
            name_index: self.name_index,
        }
    }
}

pub struct SearchIndex {
    records: Vec<Arc<PayrollRecord>>,
    rfc_index: HashMap<String, RoaringBitmap>,
    name_index: HashMap<String, RoaringBitmap>,
}

impl SearchIndex {
    /// Build an index over `records` in iteration order.
    ///
    /// Either the whole index is returned or nothing is.
    pub fn build(records: impl IntoIterator<Item = PayrollRecord>) -> Result<Self> {
        let records = records.into_iter();
        let mut builder = IndexBuilder::with_capacity(records.size_hint().0);
        for record in records {
            builder.add(record)?;
        }
        Ok(builder.finish())
    }

    #[must_use]
    pub fn empty() -> Self {
        IndexBuilder::new().finish()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn records(&self) -> &[Arc<PayrollRecord>] {
        &self.records
    }

    #[must_use]
    pub fn rfc_keys(&self) -> usize {
        self.rfc_index.len()
    }

    #[must_use]
    pub fn name_terms(&self) -> usize {
        self.name_index.len()
    }

    /// Exact RFC lookup, falling back to substring matching over every RFC
    /// key when the query has at least [`MIN_PARTIAL_RFC_LEN`] characters.
    #[must_use]
    pub fn search_by_rfc(&self, rfc: &str) -> Vec<Arc<PayrollRecord>> {
        let needle = rfc.trim().to_uppercase();
        if needle.is_empty() {
            return Vec::new();
        }

        if let Some(positions) = self.rfc_index.get(&needle) {
            return self.resolve(positions);
        }

        if needle.chars().count() < MIN_PARTIAL_RFC_LEN {
            return Vec::new();
        }

        let mut positions = RoaringBitmap::new();
        for (key, postings) in &self.rfc_index {
            if key.contains(&needle) {
                positions |= postings;
            }
        }
        self.resolve(&positions)
    }

    /// Records whose name tokens match every query term by substring,
    /// ordered by name.
    #[must_use]
    pub fn search_by_name(&self, name: &str) -> Vec<Arc<PayrollRecord>> {
        let query = name.to_uppercase();
        let mut matched: Option<RoaringBitmap> = None;

        for term in query.split_whitespace() {
            let mut term_positions = RoaringBitmap::new();
            for (token, postings) in &self.name_index {
                if token.contains(term) {
                    term_positions |= postings;
                }
            }

            let acc = matched.get_or_insert_with(|| term_positions.clone());
            *acc &= &term_positions;
            if acc.is_empty() {
                return Vec::new();
            }
        }

        let Some(positions) = matched else {
            return Vec::new();
        };
        let mut records = self.resolve(&positions);
        records.sort_by(|a, b| a.nombre().cmp(b.nombre()));
        records
    }

    fn resolve(&self, positions: &RoaringBitmap) -> Vec<Arc<PayrollRecord>> {
        positions
            .iter()
            .filter_map(|position| self.records.get(position as usize).cloned())
            .collect()
    }
}

impl std::fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchIndex")
            .field("records", &self.records.len())
            .field("rfc_keys", &self.rfc_index.len())
            .field("name_terms", &self.name_index.len())
            .finish()
    }
}
