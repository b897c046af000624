//! Derived-value observers.

use orca_model::Value;

use crate::record::Record;

/// Which columns of a record changed.
#[derive(Debug, Clone, Copy)]
pub enum ChangeSet<'a> {
    /// Every column may have changed (after a load or an explicit refresh).
    All,
    Columns(&'a [String]),
}

impl ChangeSet<'_> {
    pub fn contains(&self, column: &str) -> bool {
        match self {
            ChangeSet::All => true,
            ChangeSet::Columns(columns) => columns.iter().any(|c| c == column),
        }
    }
}

/// A value an observer wants written (or cleared) in the record it was shown.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedUpdate {
    pub column: String,
    pub value: Option<Value>,
}

impl DerivedUpdate {
    pub fn new(column: impl Into<String>, value: Option<Value>) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }
}

/// Computes derived columns from a record snapshot.
///
/// Called synchronously inside every mutation that changed stored values;
/// the returned updates are applied before the mutation returns.
/// Implementations must be pure functions of the snapshot.
pub trait RecordObserver {
    /// Whether `column` is written only by this observer. The store rejects
    /// direct writes to owned columns.
    fn owns(&self, _column: &str) -> bool {
        false
    }

    fn derive(&self, record: &Record, changes: ChangeSet<'_>) -> Vec<DerivedUpdate>;
}
