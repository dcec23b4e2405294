//! Payroll record model.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{NominaError, Result};
use crate::utils::format::{format_mxn, format_name, format_period};

/// Maximum number of concept/amount pairs a source row can carry.
pub const MAX_CONCEPTS: usize = 37;

static RFC_PATTERN: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Z&Ñ]{3,4}[0-9]{6}[A-Z0-9]{3}$").ok());

/// Opaque record identifier, assigned once at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(Uuid);

impl RecordId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a previously issued identifier (e.g. read back from storage).
    pub fn parse(raw: &str) -> Result<Self> {
        Uuid::parse_str(raw)
            .map(Self)
            .map_err(|err| NominaError::InvalidRecord(format!("bad record id {raw:?}: {err}")))
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Fixed scalar columns of a payroll row.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecordFields {
    pub plaza: String,
    pub grupo: String,
    pub rfc: String,
    pub nombre: String,
    /// Net amount in cents.
    pub liquido: f64,
    pub cct: String,
    pub cheque: String,
    pub puesto_cdc: String,
    pub desde_pag: String,
    pub hasta_pag: String,
    pub motivo: String,
}

/// One payroll check.
///
/// Records are immutable once built: the only way to obtain one is
/// [`PayrollRecord::new`] (fresh id) or [`PayrollRecord::with_id`] (rehydration),
/// both of which enforce that `conceptos` and `importes` are aligned and
/// within [`MAX_CONCEPTS`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PayrollRecord {
    id: RecordId,
    #[serde(flatten)]
    fields: RecordFields,
    conceptos: Vec<String>,
    importes: Vec<f64>,
}

impl PayrollRecord {
    pub fn new(fields: RecordFields, conceptos: Vec<String>, importes: Vec<f64>) -> Result<Self> {
        Self::with_id(RecordId::new(), fields, conceptos, importes)
    }

    pub fn with_id(
        id: RecordId,
        fields: RecordFields,
        conceptos: Vec<String>,
        importes: Vec<f64>,
    ) -> Result<Self> {
        if conceptos.len() != importes.len() {
            return Err(NominaError::InvalidRecord(format!(
                "{} conceptos but {} importes",
                conceptos.len(),
                importes.len()
            )));
        }
        if conceptos.len() > MAX_CONCEPTS {
            return Err(NominaError::InvalidRecord(format!(
                "{} concept pairs exceeds the maximum of {MAX_CONCEPTS}",
                conceptos.len()
            )));
        }
        if !fields.liquido.is_finite() || importes.iter().any(|value| !value.is_finite()) {
            return Err(NominaError::InvalidRecord(
                "amounts must be finite numbers".to_string(),
            ));
        }
        Ok(Self {
            id,
            fields,
            conceptos,
            importes,
        })
    }

    #[must_use]
    pub const fn id(&self) -> RecordId {
        self.id
    }

    #[must_use]
    pub const fn fields(&self) -> &RecordFields {
        &self.fields
    }

    #[must_use]
    pub fn rfc(&self) -> &str {
        &self.fields.rfc
    }

    #[must_use]
    pub fn nombre(&self) -> &str {
        &self.fields.nombre
    }

    #[must_use]
    pub fn cct(&self) -> &str {
        &self.fields.cct
    }

    #[must_use]
    pub fn cheque(&self) -> &str {
        &self.fields.cheque
    }

    #[must_use]
    pub const fn liquido(&self) -> f64 {
        self.fields.liquido
    }

    #[must_use]
    pub fn conceptos(&self) -> &[String] {
        &self.conceptos
    }

    #[must_use]
    pub fn importes(&self) -> &[f64] {
        &self.importes
    }

    /// Iterate `(concepto, importe)` pairs in source order.
    pub fn items(&self) -> impl Iterator<Item = (&str, f64)> {
        self.conceptos
            .iter()
            .map(String::as_str)
            .zip(self.importes.iter().copied())
    }

    /// Net pay converted from cents to pesos.
    #[must_use]
    pub fn liquido_pesos(&self) -> f64 {
        self.fields.liquido / 100.0
    }

    #[must_use]
    pub fn liquido_display(&self) -> String {
        format_mxn(self.liquido_pesos())
    }

    /// Sum of earnings (positive amounts).
    #[must_use]
    pub fn total_percepciones(&self) -> f64 {
        self.importes
            .iter()
            .filter(|amount| **amount > 0.0)
            .sum()
    }

    /// Sum of deductions, as a positive figure.
    #[must_use]
    pub fn total_deducciones(&self) -> f64 {
        self.importes
            .iter()
            .filter(|amount| **amount < 0.0)
            .map(|amount| amount.abs())
            .sum()
    }

    #[must_use]
    pub fn formatted_name(&self) -> String {
        format_name(&self.fields.nombre)
    }

    #[must_use]
    pub fn period_label(&self) -> String {
        format_period(&self.fields.desde_pag, &self.fields.hasta_pag)
    }

    /// Case-insensitive substring match against concept labels.
    #[must_use]
    pub fn has_concepto(&self, term: &str) -> bool {
        let needle = term.to_uppercase();
        self.conceptos
            .iter()
            .any(|concepto| concepto.to_uppercase().contains(&needle))
    }

    #[must_use]
    pub fn importe_at(&self, index: usize) -> Option<f64> {
        self.importes.get(index).copied()
    }

    /// Minimum data for a usable check: identifier, name and a positive net.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.fields.rfc.is_empty() && !self.fields.nombre.is_empty() && self.fields.liquido > 0.0
    }

    #[must_use]
    pub fn has_valid_rfc(&self) -> bool {
        RFC_PATTERN
            .as_ref()
            .is_some_and(|re| re.is_match(&self.fields.rfc.to_uppercase()))
    }
}
