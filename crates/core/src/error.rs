//! Error types for the treeprice domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; [`Error`] unifies them.

use thiserror::Error;

use crate::numeric::NumericKind;

/// The top-level error type for all treeprice operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Byte/token/record source errors ---
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    // --- Attribute parser configuration ---
    #[error("Column error: {0}")]
    Column(#[from] ColumnError),

    // --- Aggregation ---
    #[error("Aggregation error: {0}")]
    Aggregate(#[from] AggregateError),

    #[error("Operation cancelled")]
    Cancelled,

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error is a cancellation signal rather than a defect.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            Self::Cancelled
                | Self::Stream(StreamError::Cancelled)
                | Self::Aggregate(AggregateError::Cancelled)
        )
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Failures while reading tokens or records from a byte source.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("syntax error at byte {offset}: {message}")]
    Syntax { offset: u64, message: String },

    #[error("unexpected end of input at byte {offset}")]
    UnexpectedEof { offset: u64 },

    #[error("invalid UTF-8 at byte {offset}")]
    InvalidUtf8 { offset: u64 },

    #[error("stream cancelled")]
    Cancelled,
}

/// Attribute parser column configuration errors, raised once at construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    #[error("entity column name not specified")]
    EntityColumnNotSpecified,

    #[error("value column name not specified")]
    ValueColumnNotSpecified,

    #[error("entity and value column names are equal")]
    ColumnNamesEqual,

    #[error("entity and value column indexes are equal")]
    ColumnIndexesEqual,

    #[error("record source has no header")]
    NoHeader,

    #[error("entity column '{0}' not found in header")]
    EntityColumnMissing(String),

    #[error("value column '{0}' not found in header")]
    ValueColumnMissing(String),
}

/// Numeric text that could not be turned into a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumericError {
    #[error("cannot parse '{text}' as {kind}: {reason}")]
    Parse {
        text: String,
        kind: NumericKind,
        reason: String,
    },
}

/// Failures inside the aggregation engine.
#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("group '{group}' mixes numeric types: expected {expected}, found {found}")]
    TypeMismatch {
        group: String,
        expected: NumericKind,
        found: NumericKind,
    },

    #[error("aggregation task failed: {0}")]
    TaskFailed(String),

    #[error("aggregation cancelled")]
    Cancelled,
}
