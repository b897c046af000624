//! Calculator error types.

use orca_config::ConfigError;
use orca_model::ValueKind;
use orca_store::StoreError;
use thiserror::Error;

/// Calculator configuration or evaluation error.
///
/// Everything except [`UnknownRule`](CalcError::UnknownRule),
/// [`MultipleOutputs`](CalcError::MultipleOutputs) and the wrapped
/// store errors is raised while a calculator is being built. Missing input
/// data is never an error.
#[derive(Debug, Error)]
pub enum CalcError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{file}: '{target}' uses unknown function '{function}'")]
    UnknownFunction {
        file: String,
        target: String,
        function: String,
    },

    #[error("{file}: '{target}': {function} takes {expected} parameters, got {found}")]
    Arity {
        file: String,
        target: String,
        function: String,
        expected: String,
        found: usize,
    },

    #[error("{file}: '{target}' refers to unknown column '{column}'")]
    UnknownColumn {
        file: String,
        target: String,
        column: String,
    },

    #[error("{file}: '{target}' needs a number but column '{column}' holds {kind} values")]
    NonNumericColumn {
        file: String,
        target: String,
        column: String,
        kind: ValueKind,
    },

    #[error("{file}: '{target}' cannot hold the result of {function}: {reason}")]
    IncompatibleTarget {
        file: String,
        target: String,
        function: String,
        reason: String,
    },

    #[error("{file}: '{target}' is computed by more than one rule")]
    DuplicateTarget { file: String, target: String },

    #[error("{file}: circular dependency between {}", .targets.join(", "))]
    Cycle { file: String, targets: Vec<String> },

    /// A literal parameter has the wrong form or an unusable value.
    #[error("{file}: '{target}' parameter {index}: {reason}")]
    InvalidParameter {
        file: String,
        target: String,
        index: usize,
        reason: String,
    },

    #[error("Unknown calculator rule: {0}")]
    UnknownRule(String),

    /// Rule derives several columns; each must be measured by column name.
    #[error("Rule '{rule}' derives {}; measure one column at a time", .columns.join(", "))]
    MultipleOutputs { rule: String, columns: Vec<String> },
}

/// Result type alias for calculator operations.
pub type Result<T> = std::result::Result<T, CalcError>;
