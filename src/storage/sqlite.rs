//! SQLite-backed payroll store.
//!
//! One table of records, secondary indexes on rfc/nombre/cct and an FTS5
//! mirror kept in sync by triggers. Writes happen in per-batch transactions;
//! a failed batch rolls back as a whole and later batches are still tried.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::Serialize;

use crate::config::StoreConfig;
use crate::error::{NominaError, Result};
use crate::ingest::{BulkLoader, LoadReport, RecordSink};
use crate::model::{PayrollRecord, RecordFields, RecordId};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS payroll_records (
    id TEXT PRIMARY KEY,
    plaza TEXT NOT NULL DEFAULT '',
    grupo TEXT NOT NULL DEFAULT '',
    rfc TEXT NOT NULL,
    nombre TEXT NOT NULL,
    liquido REAL NOT NULL DEFAULT 0,
    cct TEXT NOT NULL DEFAULT '',
    cheque TEXT NOT NULL DEFAULT '',
    puesto_cdc TEXT NOT NULL DEFAULT '',
    desde_pag TEXT NOT NULL DEFAULT '',
    hasta_pag TEXT NOT NULL DEFAULT '',
    motivo TEXT NOT NULL DEFAULT '',
    conceptos TEXT NOT NULL DEFAULT '',
    importes TEXT NOT NULL DEFAULT '',
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rfc ON payroll_records(rfc);
CREATE INDEX IF NOT EXISTS idx_nombre ON payroll_records(nombre);
CREATE INDEX IF NOT EXISTS idx_cct ON payroll_records(cct);

CREATE VIRTUAL TABLE IF NOT EXISTS payroll_fts USING fts5(
    rfc, nombre, cct,
    content='payroll_records',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS payroll_fts_ai AFTER INSERT ON payroll_records BEGIN
    INSERT INTO payroll_fts(rowid, rfc, nombre, cct)
    VALUES (new.rowid, new.rfc, new.nombre, new.cct);
END;

CREATE TRIGGER IF NOT EXISTS payroll_fts_ad AFTER DELETE ON payroll_records BEGIN
    INSERT INTO payroll_fts(payroll_fts, rowid, rfc, nombre, cct)
    VALUES ('delete', old.rowid, old.rfc, old.nombre, old.cct);
END;

CREATE TRIGGER IF NOT EXISTS payroll_fts_au AFTER UPDATE ON payroll_records BEGIN
    INSERT INTO payroll_fts(payroll_fts, rowid, rfc, nombre, cct)
    VALUES ('delete', old.rowid, old.rfc, old.nombre, old.cct);
    INSERT INTO payroll_fts(rowid, rfc, nombre, cct)
    VALUES (new.rowid, new.rfc, new.nombre, new.cct);
END;
";

const DROP_SCHEMA: &str = "
DROP TRIGGER IF EXISTS payroll_fts_ai;
DROP TRIGGER IF EXISTS payroll_fts_ad;
DROP TRIGGER IF EXISTS payroll_fts_au;
DROP TABLE IF EXISTS payroll_fts;
DROP TABLE IF EXISTS payroll_records;
";

const COLUMNS: &str = "r.id, r.plaza, r.grupo, r.rfc, r.nombre, r.liquido, r.cct, r.cheque, \
     r.puesto_cdc, r.desde_pag, r.hasta_pag, r.motivo, r.conceptos, r.importes, r.created_at";

/// A record as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredRecord {
    #[serde(flatten)]
    pub record: PayrollRecord,
    pub created_at: DateTime<Utc>,
}

/// Outcome of a batched insert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InsertReport {
    pub inserted: usize,
    pub failed_batches: usize,
    pub errors: Vec<String>,
}

impl InsertReport {
    pub fn merge(&mut self, other: Self) {
        self.inserted += other.inserted;
        self.failed_batches += other.failed_batches;
        self.errors.extend(other.errors);
    }

    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.failed_batches == 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SeedOutcome {
    /// The store already held rows; nothing was loaded.
    AlreadySeeded { records: usize },
    Seeded { load: LoadReport, insert: InsertReport },
}

/// Raw column values before they are turned back into a record.
struct RawRow {
    id: String,
    fields: RecordFields,
    conceptos: String,
    importes: String,
    created_at: String,
}

impl RawRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            fields: RecordFields {
                plaza: row.get(1)?,
                grupo: row.get(2)?,
                rfc: row.get(3)?,
                nombre: row.get(4)?,
                liquido: row.get(5)?,
                cct: row.get(6)?,
                cheque: row.get(7)?,
                puesto_cdc: row.get(8)?,
                desde_pag: row.get(9)?,
                hasta_pag: row.get(10)?,
                motivo: row.get(11)?,
            },
            conceptos: row.get(12)?,
            importes: row.get(13)?,
            created_at: row.get(14)?,
        })
    }

    fn into_stored(self) -> Result<StoredRecord> {
        let id = RecordId::parse(&self.id)?;
        let mut conceptos: Vec<String> = decode_list(&id, "conceptos", &self.conceptos)?;
        let mut importes: Vec<f64> = decode_list(&id, "importes", &self.importes)?;
        if conceptos.len() != importes.len() {
            tracing::warn!(
                id = %id,
                conceptos = conceptos.len(),
                importes = importes.len(),
                "stored concept lists misaligned, truncating"
            );
            let len = conceptos.len().min(importes.len());
            conceptos.truncate(len);
            importes.truncate(len);
        }

        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|err| {
                NominaError::Persistence(format!("bad created_at {:?}: {err}", self.created_at))
            })?;

        Ok(StoredRecord {
            record: PayrollRecord::with_id(id, self.fields, conceptos, importes)?,
            created_at,
        })
    }
}

/// Durable payroll store; the only writer of its database file.
pub struct PayrollStore {
    conn: Mutex<Connection>,
    path: PathBuf,
    batch_size: usize,
    browse_limit: usize,
    search_limit: usize,
}

impl PayrollStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        Self::configure_pragmas(&conn)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "payroll store opened");

        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
            batch_size: config.batch_size.max(1),
            browse_limit: config.browse_limit,
            search_limit: config.search_limit,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn browse_limit(&self) -> usize {
        self.browse_limit
    }

    #[must_use]
    pub const fn search_limit(&self) -> usize {
        self.search_limit
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA mmap_size = 268435456;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )?;
        Ok(())
    }

    /// Drop and recreate every table, index and trigger.
    pub fn reset_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(DROP_SCHEMA)?;
        conn.execute_batch(SCHEMA)?;
        tracing::info!(path = %self.path.display(), "payroll store schema recreated");
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM payroll_records", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Insert `records` in transactions of `batch_size` rows.
    ///
    /// A failing batch is rolled back entirely and reported; the remaining
    /// batches are still attempted.
    pub fn insert_records(&self, records: &[PayrollRecord]) -> InsertReport {
        let mut report = InsertReport::default();
        let mut conn = self.conn.lock();

        for (batch_no, batch) in records.chunks(self.batch_size).enumerate() {
            match insert_batch(&mut conn, batch) {
                Ok(inserted) => report.inserted += inserted,
                Err(err) => {
                    tracing::warn!(
                        batch = batch_no,
                        records = batch.len(),
                        error = %err,
                        "store batch rolled back"
                    );
                    report.failed_batches += 1;
                    report.errors.push(err.to_string());
                }
            }
        }
        report
    }

    /// Load `loader`'s source into an empty store; a populated store is left alone.
    pub fn ensure_seeded(&self, loader: &BulkLoader) -> Result<SeedOutcome> {
        let records = self.count()?;
        if records > 0 {
            tracing::debug!(records, "payroll store already seeded");
            return Ok(SeedOutcome::AlreadySeeded { records });
        }
        self.reload(loader)
    }

    /// Replace the store's contents with `loader`'s source.
    ///
    /// The schema is recreated and every batch inserted inside one outer
    /// transaction, each batch under its own savepoint. A source-level
    /// failure (missing, undecodable, unreadable) rolls the whole thing back
    /// and leaves the previous rows in place.
    pub fn reload(&self, loader: &BulkLoader) -> Result<SeedOutcome> {
        loader.resolve_source()?;

        let mut conn = self.conn.lock();
        let mut tx = conn.transaction()?;
        tx.execute_batch(DROP_SCHEMA)?;
        tx.execute_batch(SCHEMA)?;

        let mut sink = ReloadSink {
            tx: &mut tx,
            batch_size: self.batch_size,
            report: InsertReport::default(),
        };
        let load = match loader.load_into(&mut sink) {
            Ok(load) => load,
            Err(err) => {
                tracing::warn!(error = %err, "reload failed, store left unchanged");
                return Err(err);
            }
        };
        let insert = sink.report;
        tx.commit()?;

        tracing::info!(
            inserted = insert.inserted,
            failed_batches = insert.failed_batches,
            "payroll store seeded"
        );
        Ok(SeedOutcome::Seeded { load, insert })
    }

    pub fn get(&self, id: &RecordId) -> Result<Option<StoredRecord>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM payroll_records r WHERE r.id = ?1"),
                [id.to_string()],
                RawRow::from_row,
            )
            .optional()?;
        raw.map(RawRow::into_stored).transpose()
    }

    /// Every row whose RFC equals `rfc` (case-insensitive), oldest first.
    pub fn find_by_rfc(&self, rfc: &str) -> Result<Vec<StoredRecord>> {
        let rfc = rfc.trim();
        if rfc.is_empty() {
            return Ok(Vec::new());
        }
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM payroll_records r
                 WHERE UPPER(r.rfc) = UPPER(?1)
                 ORDER BY r.rowid"
            ),
            params![rfc],
        )
    }

    /// The first `limit` rows by name.
    pub fn browse(&self, limit: usize) -> Result<Vec<StoredRecord>> {
        self.query(
            &format!("SELECT {COLUMNS} FROM payroll_records r ORDER BY r.nombre, r.rowid LIMIT ?1"),
            params![sql_limit(limit)],
        )
    }

    /// Ranked substring search over rfc, nombre and cct.
    ///
    /// Exact RFC matches come first, then RFC prefixes, then name prefixes,
    /// then any other match. A blank query browses.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<StoredRecord>> {
        let query = query.trim();
        if query.is_empty() {
            return self.browse(limit);
        }

        let escaped = escape_like(query);
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM payroll_records r
                 WHERE r.rfc LIKE ?1 ESCAPE '\\'
                    OR r.nombre LIKE ?1 ESCAPE '\\'
                    OR r.cct LIKE ?1 ESCAPE '\\'
                 ORDER BY CASE
                     WHEN UPPER(r.rfc) = UPPER(?2) THEN 1
                     WHEN r.rfc LIKE ?3 ESCAPE '\\' THEN 2
                     WHEN r.nombre LIKE ?3 ESCAPE '\\' THEN 3
                     ELSE 4
                 END, r.nombre, r.rowid
                 LIMIT ?4"
            ),
            params![
                format!("%{escaped}%"),
                query,
                format!("{escaped}%"),
                sql_limit(limit)
            ],
        )
    }

    /// Token search through the FTS5 mirror, best bm25 score first.
    ///
    /// Each whitespace-separated term is matched as a prefix; all terms must match.
    pub fn full_text_search(&self, query: &str, limit: usize) -> Result<Vec<StoredRecord>> {
        let Some(expression) = fts_expression(query) else {
            return Ok(Vec::new());
        };
        self.query(
            &format!(
                "SELECT {COLUMNS} FROM payroll_fts
                 JOIN payroll_records r ON r.rowid = payroll_fts.rowid
                 WHERE payroll_fts MATCH ?1
                 ORDER BY bm25(payroll_fts), r.rowid
                 LIMIT ?2"
            ),
            params![expression, sql_limit(limit)],
        )
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<StoredRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(sql)?;
        let rows = stmt
            .query_map(params, RawRow::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        drop(stmt);
        drop(conn);
        rows.into_iter().map(RawRow::into_stored).collect()
    }
}

fn insert_batch(conn: &mut Connection, batch: &[PayrollRecord]) -> Result<usize> {
    let tx = conn.transaction()?;
    let inserted = insert_rows(&tx, batch)?;
    tx.commit()?;
    Ok(inserted)
}

fn insert_rows(conn: &Connection, batch: &[PayrollRecord]) -> Result<usize> {
    let created_at = Utc::now().to_rfc3339();
    let mut stmt = conn.prepare_cached(
        "INSERT INTO payroll_records (
             id, plaza, grupo, rfc, nombre, liquido, cct, cheque,
             puesto_cdc, desde_pag, hasta_pag, motivo, conceptos, importes, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
    )?;
    for record in batch {
        let fields = record.fields();
        stmt.execute(params![
            record.id().to_string(),
            fields.plaza,
            fields.grupo,
            fields.rfc,
            fields.nombre,
            fields.liquido,
            fields.cct,
            fields.cheque,
            fields.puesto_cdc,
            fields.desde_pag,
            fields.hasta_pag,
            fields.motivo,
            serde_json::to_string(record.conceptos())?,
            serde_json::to_string(record.importes())?,
            created_at,
        ])?;
    }
    Ok(batch.len())
}

/// Sink used by [`PayrollStore::reload`]: batches land under savepoints of
/// the reload transaction.
struct ReloadSink<'a, 'conn> {
    tx: &'a mut Transaction<'conn>,
    batch_size: usize,
    report: InsertReport,
}

impl RecordSink for ReloadSink<'_, '_> {
    fn accept_batch(&mut self, batch: Vec<PayrollRecord>) -> Result<()> {
        let mut last_error = None;
        for (batch_no, chunk) in batch.chunks(self.batch_size).enumerate() {
            let outcome = self.tx.savepoint().map_err(NominaError::from).and_then(|sp| {
                let inserted = insert_rows(&sp, chunk)?;
                sp.commit()?;
                Ok(inserted)
            });
            match outcome {
                Ok(inserted) => self.report.inserted += inserted,
                Err(err) => {
                    tracing::warn!(
                        batch = batch_no,
                        records = chunk.len(),
                        error = %err,
                        "store batch rolled back"
                    );
                    self.report.failed_batches += 1;
                    self.report.errors.push(err.to_string());
                    last_error = Some(err.to_string());
                }
            }
        }
        match last_error {
            Some(err) => Err(NominaError::Persistence(err)),
            None => Ok(()),
        }
    }
}

/// Concept lists are stored as JSON arrays; an empty column reads as empty.
fn decode_list<T: serde::de::DeserializeOwned>(
    id: &RecordId,
    column: &str,
    raw: &str,
) -> Result<Vec<T>> {
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|err| {
        NominaError::Persistence(format!("record {id}: bad {column} column: {err}"))
    })
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn fts_expression(query: &str) -> Option<String> {
    let terms: Vec<String> = query
        .split_whitespace()
        .map(|term| format!("\"{}\"*", term.replace('"', "\"\"")))
        .collect();
    if terms.is_empty() {
        None
    } else {
        Some(terms.join(" "))
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
