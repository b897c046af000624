use thiserror::Error;

use crate::value::ValueKind;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("column map is empty")]
    EmptySchema,
    #[error("column '{0}' is declared more than once")]
    DuplicateColumn(String),
    #[error("column '{column}' uses unknown units '{units}'")]
    UnknownUnit { column: String, units: String },
    #[error("'{raw}' is not a valid {kind} value")]
    InvalidCell { kind: ValueKind, raw: String },
}

pub type Result<T> = std::result::Result<T, ModelError>;
