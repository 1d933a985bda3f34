use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::models::ClientRef;

/// Which field of a statement line could not be decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ParseErrorKind {
    InvalidDocumentId,
    InvalidDate,
    InvalidAmount,
    MalformedLine,
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ParseErrorKind::InvalidDocumentId => "invalid document id",
            ParseErrorKind::InvalidDate => "invalid date",
            ParseErrorKind::InvalidAmount => "invalid amount",
            ParseErrorKind::MalformedLine => "malformed line",
        };
        f.write_str(name)
    }
}

/// A single rejected line. Collected by the ingestor, never fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("line {line_number}: {kind} ({detail})")]
pub struct ParseError {
    pub line_number: usize,
    pub kind: ParseErrorKind,
    pub detail: String,
}

impl ParseError {
    pub fn new(line_number: usize, kind: ParseErrorKind, detail: impl Into<String>) -> Self {
        Self {
            line_number,
            kind,
            detail: detail.into(),
        }
    }
}

/// Query parameters rejected before the store is touched
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("page must be 1 or greater, got {0}")]
    InvalidPage(u32),

    #[error("document id '{0}' must contain 11 (CPF) or 14 (CNPJ) digits")]
    InvalidDocumentId(String),
}

/// Failures of the persistence gateway. Fatal for the current call.
#[derive(Error, Debug)]
pub enum StorageFault {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("transaction references unknown client {0}")]
    UnknownClient(ClientRef),

    #[error("amount {0} does not fit in minor units")]
    AmountOutOfRange(Decimal),

    #[error("corrupt row: {0}")]
    CorruptRow(String),

    #[error("storage lock poisoned")]
    Poisoned,
}

/// Errors returned by the public ingestion and query operations
#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Storage(#[from] StorageFault),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("background task failed: {0}")]
    TaskFailed(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
