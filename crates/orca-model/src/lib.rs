//! Core value types for ORCA measurement records.
//!
//! - [`Point`]: image-space coordinate pair
//! - [`Value`] / [`ValueKind`]: typed scalar cells and their CSV text form
//! - [`UnitCatalog`]: units → value kind classification
//! - [`ColumnSchema`]: ordered column descriptors with composite point and
//!   segment names derived from measurement types

pub mod column;
pub mod error;
pub mod point;
pub mod units;
pub mod value;

pub use column::{
    ColumnCategory, ColumnDescriptor, ColumnRow, ColumnSchema, MeasurementType,
    length_column_names, point_column_names,
};
pub use error::{ModelError, Result};
pub use point::Point;
pub use units::UnitCatalog;
pub use value::{MISSING_TOKEN, Value, ValueKind};
