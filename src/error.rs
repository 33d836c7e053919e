//! Input validation and sheet parsing errors

use thiserror::Error;

/// A field that cannot be fed to the calculator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} must be a finite number, got {value}")]
    NotFinite { field: String, value: f64 },

    #[error("{field} must not be negative, got {value}")]
    Negative { field: String, value: f64 },

    #[error("{field} must be between 0 and 100 percent, got {value}")]
    OutOfRange { field: String, value: f64 },
}

/// Errors reading an activity sheet
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("line {line}: expected `key = value`, found `{text}`")]
    Malformed { line: usize, text: String },

    #[error("line {line}: unknown field `{key}`")]
    UnknownField { line: usize, key: String },

    #[error("line {line}: field `{key}` given more than once")]
    DuplicateField { line: usize, key: String },

    #[error("line {line}: `{value}` is not a number (field `{key}`)")]
    InvalidNumber {
        line: usize,
        key: String,
        value: String,
    },

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("sheet pattern failed to compile: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid JSON sheet: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
