//! Error types for nomina.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum NominaError {
    #[error("no readable payroll source found (tried: {0})")]
    SourceUnavailable(String),

    #[error("could not decode {path} with any configured encoding")]
    DecodeFailed { path: PathBuf },

    #[error("payroll index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("invalid payroll record: {0}")]
    InvalidRecord(String),

    #[error("persistence failed: {0}")]
    Persistence(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("missing configuration: {0}")]
    MissingConfig(String),

    #[error("remote store error: {0}")]
    Remote(String),

    #[error("caller is not authenticated")]
    NotAuthenticated,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for NominaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for NominaError {
    fn from(err: reqwest::Error) -> Self {
        Self::Remote(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, NominaError>;
