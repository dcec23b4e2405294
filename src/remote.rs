//! Write-through mirror of payroll records to a remote structured store.
//!
//! The remote side is a PostgREST-style endpoint: rows are inserted with
//! `POST {url}/rest/v1/{table}` and read back with `GET` filtered on
//! `user_id`. Every call is tied to an authenticated [`CallerIdentity`].

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::RemoteConfig;
use crate::error::{NominaError, Result};
use crate::model::{PayrollRecord, RecordFields};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// The authenticated caller a remote write is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: String,
    pub access_token: String,
}

impl CallerIdentity {
    #[must_use]
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
        }
    }
}

fn require_identity(identity: Option<&CallerIdentity>) -> Result<&CallerIdentity> {
    identity
        .filter(|id| !id.user_id.trim().is_empty() && !id.access_token.is_empty())
        .ok_or(NominaError::NotAuthenticated)
}

/// Wire shape of a mirrored record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub user_id: String,
    pub plaza: String,
    pub grupo: String,
    pub rfc: String,
    pub nombre: String,
    pub liquido: f64,
    pub cct: String,
    pub cheque: String,
    pub puesto_cdc: String,
    pub desde_pag: String,
    pub hasta_pag: String,
    pub motivo: String,
    #[serde(default)]
    pub conceptos: Vec<String>,
    #[serde(default)]
    pub importes: Vec<f64>,
    pub created_at: DateTime<Utc>,
}

impl RemoteRecord {
    #[must_use]
    pub fn from_record(user_id: &str, record: &PayrollRecord) -> Self {
        let fields = record.fields().clone();
        Self {
            user_id: user_id.to_string(),
            plaza: fields.plaza,
            grupo: fields.grupo,
            rfc: fields.rfc,
            nombre: fields.nombre,
            liquido: fields.liquido,
            cct: fields.cct,
            cheque: fields.cheque,
            puesto_cdc: fields.puesto_cdc,
            desde_pag: fields.desde_pag,
            hasta_pag: fields.hasta_pag,
            motivo: fields.motivo,
            conceptos: record.conceptos().to_vec(),
            importes: record.importes().to_vec(),
            created_at: Utc::now(),
        }
    }

    /// Rebuild a local record (with a fresh id).
    pub fn into_record(self) -> Result<PayrollRecord> {
        PayrollRecord::new(
            RecordFields {
                plaza: self.plaza,
                grupo: self.grupo,
                rfc: self.rfc,
                nombre: self.nombre,
                liquido: self.liquido,
                cct: self.cct,
                cheque: self.cheque,
                puesto_cdc: self.puesto_cdc,
                desde_pag: self.desde_pag,
                hasta_pag: self.hasta_pag,
                motivo: self.motivo,
            },
            self.conceptos,
            self.importes,
        )
    }
}

/// Remote durable storage for payroll records.
pub trait RecordMirror {
    fn save_record(&self, identity: Option<&CallerIdentity>, record: &PayrollRecord) -> Result<()>;

    fn fetch_records(&self, identity: Option<&CallerIdentity>) -> Result<Vec<RemoteRecord>>;
}

/// Blocking REST client for the remote record table.
pub struct RestRecordStore {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    table: String,
}

impl RestRecordStore {
    pub fn new(base_url: &str, api_key: &str, table: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|err| NominaError::Config(format!("remote http client: {err}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            table: table.to_string(),
        })
    }

    pub fn from_config(config: &RemoteConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| NominaError::MissingConfig("remote.url is not set".to_string()))?;
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| NominaError::MissingConfig("remote.api_key is not set".to_string()))?;
        Self::new(url, api_key, &config.table)
    }

    fn endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn check_status(
        response: reqwest::blocking::Response,
        action: &str,
    ) -> Result<reqwest::blocking::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response
            .text()
            .unwrap_or_else(|_| "<unable to read body>".to_string());
        tracing::error!(%status, %body, action, "remote request failed");
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(NominaError::NotAuthenticated);
        }
        Err(NominaError::Remote(format!("{action}: HTTP {status}: {body}")))
    }
}

impl RecordMirror for RestRecordStore {
    fn save_record(&self, identity: Option<&CallerIdentity>, record: &PayrollRecord) -> Result<()> {
        let identity = require_identity(identity)?;
        let row = RemoteRecord::from_record(&identity.user_id, record);

        let response = self
            .client
            .post(self.endpoint())
            .header("apikey", &self.api_key)
            .bearer_auth(&identity.access_token)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()?;
        Self::check_status(response, "save record")?;

        tracing::debug!(rfc = %record.rfc(), user_id = %identity.user_id, "record mirrored");
        Ok(())
    }

    fn fetch_records(&self, identity: Option<&CallerIdentity>) -> Result<Vec<RemoteRecord>> {
        let identity = require_identity(identity)?;

        let url = reqwest::Url::parse_with_params(
            &self.endpoint(),
            &[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", identity.user_id)),
            ],
        )
        .map_err(|err| NominaError::Config(format!("remote url {}: {err}", self.base_url)))?;

        let response = self
            .client
            .get(url)
            .header("apikey", &self.api_key)
            .bearer_auth(&identity.access_token)
            .send()?;
        let response = Self::check_status(response, "fetch records")?;
        let rows: Vec<RemoteRecord> = response.json()?;

        tracing::debug!(records = rows.len(), user_id = %identity.user_id, "remote records fetched");
        Ok(rows)
    }
}

/// Per-record outcome of a write-through run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MirrorReport {
    pub saved: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

/// Push every record in `records` through `mirror`, continuing past failures.
///
/// A missing identity fails fast before anything is sent.
pub fn mirror_records<'a>(
    mirror: &dyn RecordMirror,
    identity: Option<&CallerIdentity>,
    records: impl IntoIterator<Item = &'a PayrollRecord>,
) -> Result<MirrorReport> {
    let identity = require_identity(identity)?;
    let mut report = MirrorReport::default();

    for record in records {
        match mirror.save_record(Some(identity), record) {
            Ok(()) => report.saved += 1,
            Err(NominaError::NotAuthenticated) => return Err(NominaError::NotAuthenticated),
            Err(err) => {
                tracing::warn!(rfc = %record.rfc(), error = %err, "mirror write failed");
                report.failed += 1;
                report.errors.push(err.to_string());
            }
        }
    }
    Ok(report)
}
