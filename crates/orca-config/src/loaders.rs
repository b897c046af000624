//! Typed loaders for the column map and cue configuration.

use std::collections::BTreeMap;

use csv::{ReaderBuilder, Trim};
use serde::Deserialize;
use serde_json::Value;

use orca_model::{ColumnRow, ColumnSchema, UnitCatalog};

use crate::error::{ConfigError, Result};

/// Parse a column map with the default unit catalog.
pub fn parse_column_map(text: &str, source_name: &str) -> Result<ColumnSchema> {
    parse_column_map_with_units(text, source_name, &UnitCatalog::default())
}

/// Parse a column map (`CSV-Columns.csv`) into a schema.
///
/// Rows with an empty `column_name` are skipped.
pub fn parse_column_map_with_units(
    text: &str,
    source_name: &str,
    units: &UnitCatalog,
) -> Result<ColumnSchema> {
    let load_error = |message: String| ConfigError::ConfigLoad {
        file: source_name.to_string(),
        message,
    };
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(text.trim_start_matches('\u{feff}').as_bytes());
    let mut rows = Vec::new();
    for (index, record) in reader.deserialize::<ColumnRow>().enumerate() {
        let row = record.map_err(|e| load_error(format!("row {}: {e}", index + 2)))?;
        if row.column_name.trim().is_empty() {
            continue;
        }
        rows.push(row);
    }
    let schema =
        ColumnSchema::from_rows(&rows, units).map_err(|e| load_error(e.to_string()))?;
    tracing::debug!(
        source = source_name,
        columns = schema.len(),
        points = schema.point_names().len(),
        lengths = schema.length_names().len(),
        "Parsed column map"
    );
    Ok(schema)
}

/// One `CueConfig.json` entry: a reference rule and the measurements it guides.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CueEntry {
    pub cue: String,
    pub measurements: Vec<String>,
}

#[derive(Deserialize)]
struct CueDocument {
    #[serde(default)]
    format_version: i64,
    configuration: Vec<CueEntry>,
}

/// Cue configuration with a measurement → cues lookup.
#[derive(Debug, Clone, Default)]
pub struct CueConfig {
    format_version: i64,
    entries: Vec<CueEntry>,
    lookup: BTreeMap<String, Vec<String>>,
}

impl CueConfig {
    pub fn from_value(document: Value, source_name: &str) -> Result<Self> {
        let parsed: CueDocument =
            serde_json::from_value(document).map_err(|e| ConfigError::ConfigLoad {
                file: source_name.to_string(),
                message: e.to_string(),
            })?;
        let mut lookup: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in &parsed.configuration {
            for measurement in &entry.measurements {
                let cues = lookup.entry(measurement.clone()).or_default();
                if !cues.contains(&entry.cue) {
                    cues.push(entry.cue.clone());
                }
            }
        }
        Ok(Self {
            format_version: parsed.format_version,
            entries: parsed.configuration,
            lookup,
        })
    }

    pub fn format_version(&self) -> i64 {
        self.format_version
    }

    pub fn entries(&self) -> &[CueEntry] {
        &self.entries
    }

    /// Cues to draw while `measurement` is being placed, in file order.
    pub fn cues_for(&self, measurement: &str) -> &[String] {
        self.lookup
            .get(measurement)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Every measurement that has at least one cue.
    pub fn measurements(&self) -> impl Iterator<Item = &str> {
        self.lookup.keys().map(String::as_str)
    }
}
