//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration operation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Document does not satisfy its schema. Carries every violation found.
    #[error("{source_name} failed schema validation:\n{}", .violations.join("\n"))]
    Validation {
        source_name: String,
        violations: Vec<String>,
    },

    /// Unreadable or structurally malformed configuration content.
    #[error("Failed to load configuration '{file}': {message}")]
    ConfigLoad { file: String, message: String },

    /// Import source is neither a directory nor an archive.
    #[error("Invalid config input location: {}: {reason}", .path.display())]
    InvalidInput { path: PathBuf, reason: String },

    /// Import source lacks part of the required file set.
    #[error("Missing required configuration file(s): {}", .missing.join(", "))]
    MissingConfigFiles { missing: Vec<String> },

    /// Schema name or `$ref` target that is not bundled.
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),

    /// File I/O error.
    #[error("Failed to {operation} {}", .path.display())]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Zip archive error.
    #[error("Failed to process archive {}", .path.display())]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },
}

impl ConfigError {
    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io {
            operation,
            path,
            source,
        }
    }

    pub(crate) fn archive(path: impl Into<PathBuf>) -> impl FnOnce(zip::result::ZipError) -> Self {
        let path = path.into();
        move |source| Self::Archive { path, source }
    }
}

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
