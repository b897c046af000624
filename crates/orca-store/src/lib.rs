//! Typed, CSV-backed measurement records.
//!
//! A [`DataStore`] holds one dataset: records keyed by image filename, each
//! a partial mapping from column to [`Value`](orca_model::Value). Writes are
//! checked against the column kind from the [`ColumnSchema`](orca_model::ColumnSchema);
//! composite points and segments are read and written through their backing
//! scalar columns. Subscribed [`RecordObserver`]s recompute derived columns
//! inside the write that triggered them.
//!
//! [`ActiveSubject`] carries the host's "active image changed" notification.

mod active;
mod csv_io;
mod error;
mod observer;
mod record;
mod store;

pub use active::{ActiveSubject, NO_ACTIVE_SUBJECT, SubjectChange};
pub use error::{Result, StoreError};
pub use observer::{ChangeSet, DerivedUpdate, RecordObserver};
pub use record::Record;
pub use store::{DataStore, NO_FILE};
