//! Data store error types.

use std::path::PathBuf;

use orca_model::ValueKind;
use thiserror::Error;

/// Data store operation error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Dataset file could not be read or parsed. Nothing was loaded.
    #[error("Failed to load data from {}: {message}", .path.display())]
    DataLoad { path: PathBuf, message: String },

    /// Written value kind disagrees with the column kind.
    #[error("Column '{column}' holds {expected} values, got {found}")]
    TypeMismatch {
        column: String,
        expected: ValueKind,
        found: ValueKind,
    },

    /// Text that would not load back unchanged from a CSV cell.
    #[error("Column '{column}' cannot store {text:?}: empty, padded or 'NA' text reads back differently")]
    UnstorableText { column: String, text: String },

    /// Record key that would not load back unchanged from a CSV cell.
    #[error("Invalid record key {0:?}: keys must be non-empty without surrounding whitespace")]
    InvalidKey(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    /// The record key column cannot be written through value accessors.
    #[error("Column '{0}' is the record key and cannot be written")]
    ReadOnlyColumn(String),

    /// The column is computed by a subscribed observer.
    #[error("Column '{0}' is derived from other columns and cannot be written")]
    DerivedColumn(String),

    #[error("Column '{0}' is not editable")]
    NotEditable(String),

    #[error("Row {row} is out of range ({rows} rows)")]
    RowOutOfRange { row: usize, rows: usize },

    /// File I/O error.
    #[error("Failed to {operation} {}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// CSV encoding error while saving.
    #[error("Failed to write CSV {}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Result type alias for data store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
