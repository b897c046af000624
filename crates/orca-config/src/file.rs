//! The set of configuration files and their metadata.

use std::fmt;

use crate::embedded;

/// A file in the configuration directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ConfigFile {
    CueConfig,
    MeasurementConf,
    ReferenceConf,
    /// Column map. Not schema-backed; parsed as CSV instead.
    ColumnMap,
}

impl ConfigFile {
    pub const ALL: [ConfigFile; 4] = [
        ConfigFile::CueConfig,
        ConfigFile::MeasurementConf,
        ConfigFile::ReferenceConf,
        ConfigFile::ColumnMap,
    ];

    /// Schema-backed files. An import must provide all of these.
    pub const JSON: [ConfigFile; 3] = [
        ConfigFile::CueConfig,
        ConfigFile::MeasurementConf,
        ConfigFile::ReferenceConf,
    ];

    pub fn filename(self) -> &'static str {
        match self {
            ConfigFile::CueConfig => "CueConfig.json",
            ConfigFile::MeasurementConf => "MeasurementConf.json",
            ConfigFile::ReferenceConf => "ReferenceConf.json",
            ConfigFile::ColumnMap => "CSV-Columns.csv",
        }
    }

    pub fn schema_filename(self) -> Option<&'static str> {
        match self {
            ConfigFile::CueConfig => Some("CueConfig.schema.json"),
            ConfigFile::MeasurementConf => Some("MeasurementConf.schema.json"),
            ConfigFile::ReferenceConf => Some("ReferenceConf.schema.json"),
            ConfigFile::ColumnMap => None,
        }
    }

    /// Current `format_version` of the bundled default.
    pub fn format_version(self) -> i64 {
        match self {
            ConfigFile::CueConfig => 1,
            ConfigFile::MeasurementConf | ConfigFile::ReferenceConf | ConfigFile::ColumnMap => 0,
        }
    }

    pub fn default_contents(self) -> &'static str {
        match self {
            ConfigFile::CueConfig => embedded::DEFAULT_CUE_CONFIG,
            ConfigFile::MeasurementConf => embedded::DEFAULT_MEASUREMENT_CONF,
            ConfigFile::ReferenceConf => embedded::DEFAULT_REFERENCE_CONF,
            ConfigFile::ColumnMap => embedded::DEFAULT_COLUMN_MAP,
        }
    }

    pub fn is_required_for_import(self) -> bool {
        self.schema_filename().is_some()
    }

    pub fn from_filename(filename: &str) -> Option<ConfigFile> {
        Self::ALL.into_iter().find(|file| file.filename() == filename)
    }
}

impl fmt::Display for ConfigFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.filename())
    }
}
