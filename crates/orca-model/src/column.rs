//! Column descriptors and the schema derived from the column map.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::units::UnitCatalog;
use crate::value::ValueKind;

/// Role a column plays beyond its scalar kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementType {
    /// Hand-placed coordinate (`P_x` column of a point `P`).
    Point,
    /// Coordinate written by a calculator.
    AutoPoint,
    /// Hand-measured segment length backed by four endpoint columns.
    Length,
    /// Segment length written by a calculator.
    AutoLength,
    Other(String),
}

impl MeasurementType {
    /// `None` for an empty cell.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        match trimmed {
            "" => None,
            "point" => Some(Self::Point),
            "auto point" => Some(Self::AutoPoint),
            "length" => Some(Self::Length),
            "auto length" => Some(Self::AutoLength),
            other => Some(Self::Other(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Point => "point",
            Self::AutoPoint => "auto point",
            Self::Length => "length",
            Self::AutoLength => "auto length",
            Self::Other(raw) => raw,
        }
    }

    pub fn is_point(&self) -> bool {
        matches!(self, Self::Point | Self::AutoPoint)
    }

    pub fn is_length(&self) -> bool {
        matches!(self, Self::Length | Self::AutoLength)
    }
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One raw row of the column map, as read from `CSV-Columns.csv`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ColumnRow {
    pub column_name: String,
    #[serde(default)]
    pub description: String,
    pub units: String,
    #[serde(default)]
    pub export: String,
    #[serde(default)]
    pub measurement_type: String,
    #[serde(default)]
    pub editable: String,
    #[serde(default)]
    pub is_metadata: String,
}

fn parse_flag(raw: &str) -> bool {
    raw.trim().eq_ignore_ascii_case("true")
}

/// Typed description of one physical column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub description: String,
    pub units: String,
    pub kind: ValueKind,
    pub measurement_type: Option<MeasurementType>,
    pub export: bool,
    pub editable: bool,
    pub is_metadata: bool,
}

impl ColumnDescriptor {
    /// Plain column with no flags set.
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            units: String::new(),
            kind,
            measurement_type: None,
            export: false,
            editable: false,
            is_metadata: false,
        }
    }

    pub fn from_row(row: &ColumnRow, units: &UnitCatalog) -> Result<Self> {
        let name = row.column_name.trim().to_string();
        let unit = row.units.trim();
        let kind = units
            .kind_of(unit)
            .ok_or_else(|| ModelError::UnknownUnit {
                column: name.clone(),
                units: unit.to_string(),
            })?;
        Ok(Self {
            name,
            description: row.description.trim().to_string(),
            units: unit.to_string(),
            kind,
            measurement_type: MeasurementType::parse(&row.measurement_type),
            export: parse_flag(&row.export),
            editable: parse_flag(&row.editable) || units.is_editable_unit(unit),
            is_metadata: parse_flag(&row.is_metadata),
        })
    }

    pub fn with_measurement_type(mut self, measurement_type: MeasurementType) -> Self {
        self.measurement_type = Some(measurement_type);
        self
    }

    pub fn editable(mut self) -> Self {
        self.editable = true;
        self
    }

    pub fn exported(mut self) -> Self {
        self.export = true;
        self
    }

    pub fn is_point_axis(&self) -> bool {
        self.measurement_type
            .as_ref()
            .is_some_and(MeasurementType::is_point)
    }

    pub fn is_length(&self) -> bool {
        self.measurement_type
            .as_ref()
            .is_some_and(MeasurementType::is_length)
    }
}

/// Category used for schema-derived cardinalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnCategory {
    Integer,
    Text,
    Float,
    Boolean,
    Editable,
    FetchablePoint,
    FetchableLength,
}

/// Names of the two physical columns backing point `name`.
pub fn point_column_names(name: &str) -> [String; 2] {
    [format!("{name}_x"), format!("{name}_y")]
}

/// Names of the four physical columns backing segment `name`, in
/// `x_start, y_start, x_end, y_end` order.
pub fn length_column_names(name: &str) -> [String; 4] {
    [
        format!("{name}_x_start"),
        format!("{name}_y_start"),
        format!("{name}_x_end"),
        format!("{name}_y_end"),
    ]
}

/// Ordered column set loaded from the column map.
///
/// The first column is the record key. Composite point and length names
/// are derived from the descriptors' measurement types.
#[derive(Debug, Clone)]
pub struct ColumnSchema {
    columns: Vec<ColumnDescriptor>,
    positions: HashMap<String, usize>,
    points: Vec<String>,
    lengths: Vec<String>,
}

impl ColumnSchema {
    pub fn new(columns: Vec<ColumnDescriptor>) -> Result<Self> {
        if columns.is_empty() {
            return Err(ModelError::EmptySchema);
        }
        let mut positions = HashMap::with_capacity(columns.len());
        for (index, column) in columns.iter().enumerate() {
            if positions.insert(column.name.clone(), index).is_some() {
                return Err(ModelError::DuplicateColumn(column.name.clone()));
            }
        }

        let mut points = Vec::new();
        let mut lengths = Vec::new();
        for column in &columns {
            if column.is_point_axis()
                && let Some(base) = column.name.strip_suffix("_x")
                && positions.contains_key(&format!("{base}_y"))
            {
                points.push(base.to_string());
            }
            if column.is_length()
                && length_column_names(&column.name)
                    .iter()
                    .all(|name| positions.contains_key(name))
            {
                lengths.push(column.name.clone());
            }
        }

        Ok(Self {
            columns,
            positions,
            points,
            lengths,
        })
    }

    pub fn from_rows(rows: &[ColumnRow], units: &UnitCatalog) -> Result<Self> {
        let columns = rows
            .iter()
            .map(|row| ColumnDescriptor::from_row(row, units))
            .collect::<Result<Vec<_>>>()?;
        Self::new(columns)
    }

    pub fn key_column(&self) -> &ColumnDescriptor {
        &self.columns[0]
    }

    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Always false; a schema holds at least the key column.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.position(name).map(|index| &self.columns[index])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Logical point names, in column order.
    pub fn point_names(&self) -> &[String] {
        &self.points
    }

    /// Logical segment names, in column order.
    pub fn length_names(&self) -> &[String] {
        &self.lengths
    }

    pub fn point_columns(&self, name: &str) -> Option<[String; 2]> {
        self.points
            .iter()
            .any(|p| p == name)
            .then(|| point_column_names(name))
    }

    pub fn length_columns(&self, name: &str) -> Option<[String; 4]> {
        self.lengths
            .iter()
            .any(|l| l == name)
            .then(|| length_column_names(name))
    }

    pub fn in_category(&self, column: &ColumnDescriptor, category: ColumnCategory) -> bool {
        match category {
            ColumnCategory::Integer => column.kind == ValueKind::Integer,
            ColumnCategory::Text => column.kind == ValueKind::Text,
            ColumnCategory::Float => column.kind == ValueKind::Float,
            ColumnCategory::Boolean => column.kind == ValueKind::Boolean,
            ColumnCategory::Editable => column.editable,
            ColumnCategory::FetchablePoint => column
                .name
                .strip_suffix("_x")
                .is_some_and(|base| self.points.iter().any(|p| p == base)),
            ColumnCategory::FetchableLength => self.lengths.contains(&column.name),
        }
    }

    /// Number of logical members in `category`, derived from the loaded map.
    ///
    /// Points and lengths count composites, the rest count physical columns.
    pub fn category_count(&self, category: ColumnCategory) -> usize {
        match category {
            ColumnCategory::FetchablePoint => self.points.len(),
            ColumnCategory::FetchableLength => self.lengths.len(),
            _ => self
                .columns
                .iter()
                .filter(|column| self.in_category(column, category))
                .count(),
        }
    }

    /// Key column followed by every column flagged for export.
    pub fn export_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns
            .iter()
            .enumerate()
            .filter(|(index, column)| *index == 0 || column.export)
            .map(|(_, column)| column)
    }
}
