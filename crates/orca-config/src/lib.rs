//! Configuration for ORCA measurement sessions.
//!
//! - `embedded` - bundled default files and schemas
//! - `validator` - offline JSON Schema validation with aggregated violations
//! - `manager` - the configuration directory: versioning, backups, import/export
//! - `loaders` - typed column map and cue configuration
//! - `paths` - default directory resolution

pub mod embedded;
mod error;
mod file;
mod loaders;
mod manager;
pub mod paths;
mod validator;

pub use error::{ConfigError, Result};
pub use file::ConfigFile;
pub use loaders::{CueConfig, CueEntry, parse_column_map, parse_column_map_with_units};
pub use manager::{ConfigManager, FORMAT_VERSION_KEY};
pub use validator::{
    ANNOTATION_KEYWORDS, SchemaValidator, VALIDATION_KEYWORDS, Violation, type_name,
};
