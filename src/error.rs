use thiserror::Error;

use crate::data::model::ColumnType;

/// Errors produced by the analytics engines.
///
/// Ingestion failures are not part of this enum: the loader reports them as
/// `anyhow` errors and the hosting layer treats them as hard failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("invalid range for '{column}': min {min} is greater than max {max}")]
    InvalidRange { column: String, min: f64, max: f64 },

    #[error("dataset has no column usable as a date/time axis")]
    NoTemporalColumn,

    #[error("empty selection: {what}")]
    EmptySelection { what: String },

    #[error("column '{name}' not found")]
    ColumnNotFound { name: String },

    #[error("column '{column}' is {actual}, expected {expected}")]
    TypeMismatch {
        column: String,
        expected: String,
        actual: ColumnType,
    },

    #[error("duplicate column name '{name}'")]
    DuplicateColumn { name: String },

    #[error("column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("export failed: {0}")]
    Export(String),
}

impl From<csv::Error> for EngineError {
    fn from(error: csv::Error) -> Self {
        EngineError::Export(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
