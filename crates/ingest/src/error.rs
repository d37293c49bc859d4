use core_types::CanonicalField;
use serde::Serialize;
use thiserror::Error;

/// A problem with a single row. The row is dropped and reported; the rest of
/// the upload carries on.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationError {
    #[error("missing value for {field}")]
    MissingValue { field: CanonicalField },

    #[error("invalid date '{value}' in {field}")]
    InvalidDate { field: CanonicalField, value: String },

    #[error("invalid number '{value}' in {field}")]
    InvalidNumber { field: CanonicalField, value: String },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: CanonicalField, value: String },

    #[error("{field} must be positive, got {value}")]
    NonPositive { field: CanonicalField, value: String },

    #[error("{field} value {value} is outside {min}..={max}")]
    OutOfRange {
        field: CanonicalField,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("malformed row: {message}")]
    Malformed { message: String },
}

impl ValidationError {
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, ValidationError::OutOfRange { .. })
    }
}

/// No alias resolves a required column. Fatal to the whole upload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaMappingError {
    #[error("required column '{field}' not found (accepted headers: {})", .accepted.join(", "))]
    MissingColumn {
        field: CanonicalField,
        accepted: Vec<String>,
    },
}

/// The uploaded bytes could not be turned into a table at all.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("failed to read CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to read workbook: {0}")]
    Workbook(String),

    #[error("the workbook contains no worksheet")]
    NoWorksheet,

    #[error("the sheet has no header row")]
    MissingHeader,

    #[error("unsupported file format '{0}' (expected csv or xlsx)")]
    UnsupportedFormat(String),
}

/// Any failure that aborts an upload before a single row is persisted.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error(transparent)]
    Sheet(#[from] SheetError),

    #[error(transparent)]
    Schema(#[from] SchemaMappingError),
}
