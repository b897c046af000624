use orca_store::DataStore;

use crate::error::Result;

/// A rule-driven computation over a [`DataStore`] record.
///
/// `rule` names a configuration entry (its `target`) and `key` the record.
pub trait Calculator {
    type Output;

    /// Attach to `store`. The default does nothing.
    fn register(&self, _store: &mut DataStore) {}

    /// Whether `rule` exists and every column it reads has a value for `key`.
    fn preflight_measurement(&self, store: &DataStore, rule: &str, key: &str) -> bool;

    /// Evaluate `rule` for `key`.
    ///
    /// Fails only for an unknown rule. Missing inputs produce an empty
    /// result, never an error.
    fn do_measurement(&self, store: &DataStore, rule: &str, key: &str) -> Result<Self::Output>;
}
