//! CSV reading and atomic writing of record tables.

use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};

use orca_model::{ColumnDescriptor, ColumnSchema, ValueKind};

use crate::error::{Result, StoreError};
use crate::record::Record;

/// A fully parsed dataset, ready to replace a store's contents.
#[derive(Debug, Default)]
pub(crate) struct LoadedTable {
    pub extra_columns: Vec<ColumnDescriptor>,
    pub records: Vec<Record>,
}

fn normalize_header(raw: &str) -> String {
    raw.trim().trim_matches('\u{feff}').to_string()
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(|cell| cell.trim().is_empty())
}

/// Parse `path` against `schema`.
///
/// Unknown header columns become text columns. Blank rows are skipped.
pub(crate) fn read_table(schema: &ColumnSchema, path: &Path) -> Result<LoadedTable> {
    let load_error = |message: String| StoreError::DataLoad {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|e| load_error(e.to_string()))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(file);
    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| load_error(e.to_string()))?
        .iter()
        .map(normalize_header)
        .collect();

    let key_name = &schema.key_column().name;
    let mut seen = HashSet::new();
    for header in &headers {
        if !seen.insert(header.as_str()) {
            return Err(load_error(format!("duplicate column '{header}'")));
        }
    }
    let Some(key_index) = headers.iter().position(|h| h == key_name) else {
        return Err(load_error(format!("missing key column '{key_name}'")));
    };

    let mut extra_columns = Vec::new();
    let kinds: Vec<ValueKind> = headers
        .iter()
        .map(|header| match schema.get(header) {
            Some(descriptor) => descriptor.kind,
            None => {
                extra_columns.push(ColumnDescriptor::new(header.clone(), ValueKind::Text));
                ValueKind::Text
            }
        })
        .collect();

    let mut records = Vec::new();
    let mut keys: HashMap<String, u64> = HashMap::new();
    for result in reader.records() {
        let row = result.map_err(|e| load_error(e.to_string()))?;
        if is_blank(&row) {
            continue;
        }
        let line = row.position().map_or(0, csv::Position::line);
        if row.len() > headers.len() {
            return Err(load_error(format!(
                "line {line} has {} fields but the header has {}",
                row.len(),
                headers.len()
            )));
        }

        let key = row.get(key_index).map(str::trim).unwrap_or_default();
        if key.is_empty() {
            return Err(load_error(format!("line {line} has no {key_name}")));
        }
        if let Some(first) = keys.insert(key.to_string(), line) {
            return Err(load_error(format!(
                "duplicate {key_name} '{key}' on lines {first} and {line}"
            )));
        }

        let mut record = Record::new(key);
        for (index, cell) in row.iter().enumerate() {
            if index == key_index {
                continue;
            }
            let value = kinds[index].parse_cell(cell).map_err(|e| {
                load_error(format!("line {line}, column '{}': {e}", headers[index]))
            })?;
            record.set(&headers[index], value);
        }
        records.push(record);
    }

    Ok(LoadedTable {
        extra_columns,
        records,
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write `records` restricted to `columns`, atomically (temp file + rename).
///
/// The first column is the record key.
pub(crate) fn write_table(
    path: &Path,
    columns: &[&ColumnDescriptor],
    records: &[Record],
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| StoreError::Io {
            operation: "create directory",
            path: parent.to_path_buf(),
            source: e,
        })?;
    }

    let temp = temp_path(path);
    let csv_error = |source: csv::Error| StoreError::Csv {
        path: temp.clone(),
        source,
    };

    let file = File::create(&temp).map_err(|e| StoreError::Io {
        operation: "create",
        path: temp.clone(),
        source: e,
    })?;
    let mut writer = WriterBuilder::new().from_writer(file);
    writer
        .write_record(columns.iter().map(|c| c.name.as_str()))
        .map_err(csv_error)?;
    for record in records {
        let row = columns.iter().enumerate().map(|(index, column)| {
            if index == 0 {
                record.key().to_string()
            } else {
                column.kind.format_cell(record.get(&column.name))
            }
        });
        writer.write_record(row).map_err(csv_error)?;
    }
    let file = writer.into_inner().map_err(|e| StoreError::Io {
        operation: "flush",
        path: temp.clone(),
        source: e.into_error(),
    })?;
    file.sync_all().map_err(|e| StoreError::Io {
        operation: "sync",
        path: temp.clone(),
        source: e,
    })?;

    fs::rename(&temp, path).map_err(|e| StoreError::Io {
        operation: "replace",
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}
