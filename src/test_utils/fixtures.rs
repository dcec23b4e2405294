//! Builders for payroll export rows and source files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::ingest::parser::{AMOUNT_START, CONCEPT_START};

/// Header line written at the top of generated sources.
pub const HEADER: &str = "PLAZA,GRUPO,RFC,NOMBRE,LIQUIDO,CCT,CHEQUE,PUESTO_CDC,DESDE_PAG,HASTA_PAG,MOTIVO";

/// One export row, rendered to a fixed number of columns.
#[derive(Debug, Clone)]
pub struct CsvRow {
    pub plaza: String,
    pub rfc: String,
    pub nombre: String,
    pub liquido: String,
    pub cct: String,
    pub cheque: String,
    items: BTreeMap<usize, (String, String)>,
}

impl CsvRow {
    #[must_use]
    pub fn new(rfc: &str, nombre: &str) -> Self {
        Self {
            plaza: "0701".to_string(),
            rfc: rfc.to_string(),
            nombre: nombre.to_string(),
            liquido: "150000".to_string(),
            cct: "15DPR0001Z".to_string(),
            cheque: "1000001".to_string(),
            items: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_cct(mut self, cct: &str) -> Self {
        self.cct = cct.to_string();
        self
    }

    #[must_use]
    pub fn with_cheque(mut self, cheque: &str) -> Self {
        self.cheque = cheque.to_string();
        self
    }

    /// Put `concepto` at concept slot `slot` and `importe` at the matching amount slot.
    #[must_use]
    pub fn with_item(mut self, slot: usize, concepto: &str, importe: &str) -> Self {
        self.items
            .insert(slot, (concepto.to_string(), importe.to_string()));
        self
    }

    /// Render with exactly `columns` comma-separated fields (minimum 11).
    #[must_use]
    pub fn to_line_with_columns(&self, columns: usize) -> String {
        let mut cells = vec![String::new(); columns.max(11)];
        cells[0].clone_from(&self.plaza);
        cells[1] = "A1".to_string();
        cells[2].clone_from(&self.rfc);
        cells[3].clone_from(&self.nombre);
        cells[4].clone_from(&self.liquido);
        cells[5].clone_from(&self.cct);
        cells[6].clone_from(&self.cheque);
        cells[7] = "DOCENTE".to_string();
        cells[8] = "20240101".to_string();
        cells[9] = "20240115".to_string();
        cells[10] = "ORD".to_string();
        for (slot, (concepto, importe)) in &self.items {
            if let Some(cell) = cells.get_mut(CONCEPT_START + slot) {
                cell.clone_from(concepto);
            }
            if let Some(cell) = cells.get_mut(AMOUNT_START + slot) {
                cell.clone_from(importe);
            }
        }
        cells.join(",")
    }

    /// Render with just enough columns to carry every item.
    #[must_use]
    pub fn to_line(&self) -> String {
        let columns = self
            .items
            .keys()
            .max()
            .map_or(11, |slot| AMOUNT_START + slot + 1);
        self.to_line_with_columns(columns)
    }
}

/// Shorthand for a row with items in consecutive slots.
#[must_use]
pub fn record_line(rfc: &str, nombre: &str, items: &[(&str, &str)]) -> String {
    items
        .iter()
        .enumerate()
        .fold(CsvRow::new(rfc, nombre), |row, (slot, (concepto, importe))| {
            row.with_item(slot, concepto, importe)
        })
        .to_line()
}

/// Isolated directory holding generated source files.
pub struct SourceFixture {
    pub temp_dir: TempDir,
}

impl SourceFixture {
    #[must_use]
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
        }
    }

    /// Write `HEADER` followed by `lines` to `name`.
    #[must_use]
    pub fn write_source(&self, name: &str, lines: &[String]) -> PathBuf {
        let mut content = String::from(HEADER);
        for line in lines {
            content.push('\n');
            content.push_str(line);
        }
        content.push('\n');
        self.write_bytes(name, content.as_bytes())
    }

    #[must_use]
    pub fn write_bytes(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        std::fs::write(&path, bytes).expect("write source");
        path
    }

    #[must_use]
    pub fn path(&self, name: &str) -> PathBuf {
        self.temp_dir.path().join(name)
    }
}

impl Default for SourceFixture {
    fn default() -> Self {
        Self::new()
    }
}
