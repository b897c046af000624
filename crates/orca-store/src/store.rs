//! The typed record store.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use orca_model::{ColumnDescriptor, ColumnSchema, Point, Value, ValueKind};

use crate::csv_io::{self, LoadedTable};
use crate::error::{Result, StoreError};
use crate::observer::{ChangeSet, RecordObserver};
use crate::record::Record;

/// Display name used when no dataset file is associated with the store.
pub const NO_FILE: &str = "No File";

/// Records keyed by image filename, typed by a [`ColumnSchema`].
///
/// Rows keep insertion order. Every write is checked against the column
/// kind, and every write that changes a value marks the store dirty and
/// runs the subscribed [`RecordObserver`]s before returning.
pub struct DataStore {
    schema: Arc<ColumnSchema>,
    /// Columns found in the last loaded file but not in the schema. Always text.
    extra_columns: Vec<ColumnDescriptor>,
    records: Vec<Record>,
    rows: HashMap<String, usize>,
    csv_path: Option<PathBuf>,
    dirty: bool,
    observers: Vec<Box<dyn RecordObserver>>,
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("columns", &self.column_count())
            .field("rows", &self.records.len())
            .field("csv_path", &self.csv_path)
            .field("dirty", &self.dirty)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl DataStore {
    /// Empty store typed by `schema`, with no file and no observers.
    pub fn new(schema: Arc<ColumnSchema>) -> Self {
        Self {
            schema,
            extra_columns: Vec::new(),
            records: Vec::new(),
            rows: HashMap::new(),
            csv_path: None,
            dirty: false,
            observers: Vec::new(),
        }
    }

    /// Column schema the store was built with.
    pub fn schema(&self) -> &Arc<ColumnSchema> {
        &self.schema
    }

    /// Name of the record key column.
    pub fn key_column(&self) -> &str {
        &self.schema.key_column().name
    }

    /// Unknown columns carried over from the last load.
    pub fn extra_columns(&self) -> &[ColumnDescriptor] {
        &self.extra_columns
    }

    /// Descriptor for a schema or carried-over column.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.schema
            .get(name)
            .or_else(|| self.extra_columns.iter().find(|c| c.name == name))
    }

    /// Add an observer. It runs on the next write; existing records are
    /// only refreshed by [`recompute_all`](Self::recompute_all) or a load.
    pub fn subscribe(&mut self, observer: Box<dyn RecordObserver>) {
        self.observers.push(observer);
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Replace the contents with the records in `path`, or with an empty
    /// dataset for `None`.
    ///
    /// The file is parsed in full before anything is replaced, so a failed
    /// load leaves the store as it was. Derived values are refreshed
    /// afterwards without marking the store dirty.
    pub fn load_data(&mut self, path: Option<&Path>) -> Result<()> {
        let Some(path) = path else {
            self.replace(LoadedTable::default(), None);
            tracing::debug!("Reset data store to an empty dataset");
            return Ok(());
        };
        let table = csv_io::read_table(&self.schema, path)?;
        if !table.extra_columns.is_empty() {
            tracing::warn!(
                path = %path.display(),
                columns = ?table.extra_columns.iter().map(|c| &c.name).collect::<Vec<_>>(),
                "Keeping columns not in the column map as text"
            );
        }
        self.replace(table, Some(path.to_path_buf()));
        self.recompute_all();
        tracing::info!(
            path = %path.display(),
            rows = self.records.len(),
            "Loaded measurement data"
        );
        Ok(())
    }

    fn replace(&mut self, table: LoadedTable, csv_path: Option<PathBuf>) {
        self.extra_columns = table.extra_columns;
        self.records = table.records;
        self.reindex();
        self.csv_path = csv_path;
        self.dirty = false;
    }

    fn reindex(&mut self) {
        self.rows = self
            .records
            .iter()
            .enumerate()
            .map(|(row, record)| (record.key().to_string(), row))
            .collect();
    }

    fn all_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.schema.columns().iter().chain(&self.extra_columns)
    }

    /// Write every row and column, then clear the dirty flag.
    ///
    /// Schema columns come first in schema order, then carried-over columns.
    pub fn save_as_csv(&mut self, path: &Path) -> Result<()> {
        let columns: Vec<&ColumnDescriptor> = self.all_columns().collect();
        csv_io::write_table(path, &columns, &self.records)?;
        self.csv_path = Some(path.to_path_buf());
        self.dirty = false;
        tracing::info!(path = %path.display(), rows = self.records.len(), "Saved measurement data");
        Ok(())
    }

    /// Write the key column and every export-flagged column.
    ///
    /// Unlike [`save_as_csv`](Self::save_as_csv) this leaves the dirty flag
    /// and the associated file alone.
    pub fn export_csv(&self, path: &Path) -> Result<()> {
        let columns: Vec<&ColumnDescriptor> = self.schema.export_columns().collect();
        csv_io::write_table(path, &columns, &self.records)?;
        tracing::info!(
            path = %path.display(),
            rows = self.records.len(),
            columns = columns.len(),
            "Exported measurement data"
        );
        Ok(())
    }

    /// File last loaded or saved.
    pub fn csv_path(&self) -> Option<&Path> {
        self.csv_path.as_deref()
    }

    /// File name of the associated dataset, or [`NO_FILE`].
    pub fn csv_file_name(&self) -> String {
        self.csv_path
            .as_deref()
            .and_then(Path::file_name)
            .map_or_else(|| NO_FILE.to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// Whether a write changed a value since the last load or save.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Override the dirty flag, e.g. after the host persisted the data itself.
    pub fn set_dirty(&mut self, dirty: bool) {
        self.dirty = dirty;
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// Record for `key`, if one exists.
    pub fn record(&self, key: &str) -> Option<&Record> {
        self.find_row(key).map(|row| &self.records[row])
    }

    /// Every record in row order.
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Record keys in row order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(Record::key)
    }

    /// Row index of `key`.
    pub fn find_row(&self, key: &str) -> Option<usize> {
        self.rows.get(key).copied()
    }

    /// Whether a record exists for `key`.
    pub fn has_row(&self, key: &str) -> bool {
        self.rows.contains_key(key)
    }

    /// Remove the record for `key` and all of its values.
    pub fn remove_row(&mut self, key: &str) -> bool {
        let Some(row) = self.find_row(key) else {
            return false;
        };
        self.records.remove(row);
        self.reindex();
        self.dirty = true;
        tracing::debug!(key, "Removed record");
        true
    }

    // =========================================================================
    // Scalar access
    // =========================================================================

    /// Value of `column` for `key`; `None` when absent or the record is missing.
    pub fn get_value(&self, key: &str, column: &str) -> Option<&Value> {
        self.record(key)?.get(column)
    }

    /// Set or clear one value. Creates the record on first write.
    ///
    /// Returns whether anything changed. Rejects the key column, columns
    /// owned by an observer, values of the wrong kind, and text or new keys
    /// that would not load back unchanged from the saved CSV.
    pub fn insert_value(&mut self, key: &str, column: &str, value: Option<Value>) -> Result<bool> {
        self.write_cells(key, vec![(column.to_string(), value)])
    }

    /// [`insert_value`](Self::insert_value) with a present value.
    pub fn set_value(&mut self, key: &str, column: &str, value: impl Into<Value>) -> Result<bool> {
        self.insert_value(key, column, Some(value.into()))
    }

    /// [`insert_value`](Self::insert_value) with `None`.
    pub fn clear_value(&mut self, key: &str, column: &str) -> Result<bool> {
        self.insert_value(key, column, None)
    }

    fn writable_kind(&self, column: &str) -> Result<ValueKind> {
        if column == self.key_column() {
            return Err(StoreError::ReadOnlyColumn(column.to_string()));
        }
        self.column(column)
            .map(|descriptor| descriptor.kind)
            .ok_or_else(|| StoreError::UnknownColumn(column.to_string()))
    }

    fn check_write(&self, column: &str, value: Option<&Value>) -> Result<()> {
        let expected = self.writable_kind(column)?;
        match value {
            Some(value) if value.kind() != expected => Err(StoreError::TypeMismatch {
                column: column.to_string(),
                expected,
                found: value.kind(),
            }),
            Some(value) if !value.has_cell_form() => Err(StoreError::UnstorableText {
                column: column.to_string(),
                text: value.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn check_key(key: &str) -> Result<()> {
        if key.is_empty() || key.trim() != key {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    /// Type-check every cell, then apply them together and notify once.
    fn write_cells(&mut self, key: &str, cells: Vec<(String, Option<Value>)>) -> Result<bool> {
        for (column, value) in &cells {
            self.check_write(column, value.as_ref())?;
            if self.observers.iter().any(|observer| observer.owns(column)) {
                return Err(StoreError::DerivedColumn(column.clone()));
            }
        }
        let row = match self.find_row(key) {
            Some(row) => row,
            None if cells.iter().all(|(_, value)| value.is_none()) => return Ok(false),
            None => {
                Self::check_key(key)?;
                self.records.push(Record::new(key));
                self.rows.insert(key.to_string(), self.records.len() - 1);
                self.records.len() - 1
            }
        };

        let mut changed = Vec::new();
        for (column, value) in cells {
            if self.records[row].set(&column, value) {
                changed.push(column);
            }
        }
        if changed.is_empty() {
            return Ok(false);
        }
        self.dirty = true;
        self.refresh_row(row, ChangeSet::Columns(&changed));
        Ok(true)
    }

    /// Recompute derived values for every record.
    ///
    /// The dirty flag is left as it was.
    pub fn recompute_all(&mut self) {
        let dirty = self.dirty;
        for row in 0..self.records.len() {
            self.refresh_row(row, ChangeSet::All);
        }
        self.dirty = dirty;
    }

    fn refresh_row(&mut self, row: usize, changes: ChangeSet<'_>) {
        if self.observers.is_empty() {
            return;
        }
        let observers = std::mem::take(&mut self.observers);
        for observer in &observers {
            for update in observer.derive(&self.records[row], changes) {
                if let Err(e) = self.check_write(&update.column, update.value.as_ref()) {
                    tracing::warn!(column = %update.column, error = %e, "Dropping derived value");
                    continue;
                }
                if self.records[row].set(&update.column, update.value) {
                    self.dirty = true;
                }
            }
        }
        self.observers = observers;
    }

    // =========================================================================
    // Composite access
    // =========================================================================

    /// Point `name`, present only when both backing columns are.
    pub fn get_point(&self, key: &str, name: &str) -> Option<Point> {
        self.schema.point_columns(name)?;
        self.record(key)?.point(name)
    }

    /// Write both coordinates of point `name`, or clear both for `None`.
    pub fn set_point(&mut self, key: &str, name: &str, point: Option<Point>) -> Result<bool> {
        let [x, y] = self
            .schema
            .point_columns(name)
            .ok_or_else(|| StoreError::UnknownColumn(name.to_string()))?;
        let cells = vec![
            self.coordinate_cell(x, point.map(|p| p.x)),
            self.coordinate_cell(y, point.map(|p| p.y)),
        ];
        self.write_cells(key, cells)
    }

    /// Endpoints of segment `name`, present only when all four backing
    /// columns are.
    pub fn get_endpoints(&self, key: &str, name: &str) -> Option<(Point, Point)> {
        self.schema.length_columns(name)?;
        self.record(key)?.endpoints(name)
    }

    /// Write all four endpoint coordinates of segment `name`, or clear them.
    pub fn set_endpoints(
        &mut self,
        key: &str,
        name: &str,
        endpoints: Option<(Point, Point)>,
    ) -> Result<bool> {
        let [xs, ys, xe, ye] = self
            .schema
            .length_columns(name)
            .ok_or_else(|| StoreError::UnknownColumn(name.to_string()))?;
        let cells = vec![
            self.coordinate_cell(xs, endpoints.map(|(start, _)| start.x)),
            self.coordinate_cell(ys, endpoints.map(|(start, _)| start.y)),
            self.coordinate_cell(xe, endpoints.map(|(_, end)| end.x)),
            self.coordinate_cell(ye, endpoints.map(|(_, end)| end.y)),
        ];
        self.write_cells(key, cells)
    }

    /// Coordinate value in the kind its column declares.
    fn coordinate_cell(&self, column: String, value: Option<f64>) -> (String, Option<Value>) {
        let kind = self.column(&column).map(|c| c.kind);
        let value = value.map(|v| match kind {
            Some(ValueKind::Integer) => Value::Integer(v.round() as i64),
            _ => Value::Float(v),
        });
        (column, value)
    }

    // =========================================================================
    // Grid view
    // =========================================================================

    /// Number of records.
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Schema columns plus carried-over columns.
    pub fn column_count(&self) -> usize {
        self.schema.len() + self.extra_columns.len()
    }

    fn column_at(&self, index: usize) -> Option<&ColumnDescriptor> {
        self.schema
            .columns()
            .get(index)
            .or_else(|| self.extra_columns.get(index.checked_sub(self.schema.len())?))
    }

    /// Column name at `index`, or an empty string when out of range.
    pub fn column_name(&self, index: usize) -> &str {
        self.column_at(index).map_or("", |c| c.name.as_str())
    }

    /// Value kind of the column at `index`.
    pub fn column_class(&self, index: usize) -> Option<ValueKind> {
        self.column_at(index).map(|c| c.kind)
    }

    /// Grid index of column `name`, counting carried-over columns after the
    /// schema.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.schema.position(name).or_else(|| {
            self.extra_columns
                .iter()
                .position(|c| c.name == name)
                .map(|offset| self.schema.len() + offset)
        })
    }

    /// Record key at `row`.
    pub fn row_name(&self, row: usize) -> Option<&str> {
        self.records.get(row).map(Record::key)
    }

    /// Cell at (`row`, `column`). The key column reads as text.
    pub fn value_at(&self, row: usize, column: usize) -> Option<Value> {
        let record = self.records.get(row)?;
        let descriptor = self.column_at(column)?;
        if column == 0 {
            return Some(Value::Text(record.key().to_string()));
        }
        record.get(&descriptor.name).cloned()
    }

    /// True when `row` exists and the column at `column` is editable.
    pub fn is_cell_editable(&self, row: usize, column: usize) -> bool {
        row < self.records.len() && self.column_at(column).is_some_and(|c| c.editable)
    }

    /// Write an editable cell through the grid.
    pub fn set_value_at(
        &mut self,
        row: usize,
        column: usize,
        value: Option<Value>,
    ) -> Result<bool> {
        let key = self
            .row_name(row)
            .ok_or_else(|| StoreError::RowOutOfRange {
                row,
                rows: self.records.len(),
            })?
            .to_string();
        let descriptor = self
            .column_at(column)
            .ok_or_else(|| StoreError::UnknownColumn(format!("#{column}")))?;
        if !descriptor.editable {
            return Err(StoreError::NotEditable(descriptor.name.clone()));
        }
        let name = descriptor.name.clone();
        self.insert_value(&key, &name, value)
    }
}
