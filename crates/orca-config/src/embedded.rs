//! Bundled default configuration and schemas.
//!
//! Embedded at compile time with `include_str!()` so first-run bootstrap,
//! restore and validation never depend on files shipped beside the binary.

// =============================================================================
// Default configuration
// =============================================================================

/// Default `CSV-Columns.csv` column map.
pub const DEFAULT_COLUMN_MAP: &str = include_str!("../data/CSV-Columns.csv");

/// Default `CueConfig.json`.
pub const DEFAULT_CUE_CONFIG: &str = include_str!("../data/CueConfig.json");

/// Default `MeasurementConf.json`.
pub const DEFAULT_MEASUREMENT_CONF: &str = include_str!("../data/MeasurementConf.json");

/// Default `ReferenceConf.json`.
pub const DEFAULT_REFERENCE_CONF: &str = include_str!("../data/ReferenceConf.json");

// =============================================================================
// Schemas
// =============================================================================

/// Public schema URL → bundled copy.
pub const SCHEMA_MAP: &str = include_str!("../data/schema/schema-map.json");

/// Prefix of `localURL` entries in [`SCHEMA_MAP`] that name a bundled schema.
pub const BUNDLED_SCHEMA_PREFIX: &str = "resource:/schema/";

/// Bundled schemas by file name.
pub const SCHEMAS: &[(&str, &str)] = &[
    (
        "CueConfig.schema.json",
        include_str!("../data/schema/CueConfig.schema.json"),
    ),
    (
        "MeasurementConf.schema.json",
        include_str!("../data/schema/MeasurementConf.schema.json"),
    ),
    (
        "ReferenceConf.schema.json",
        include_str!("../data/schema/ReferenceConf.schema.json"),
    ),
    (
        "calculator-item.schema.json",
        include_str!("../data/schema/calculator-item.schema.json"),
    ),
];
