use std::collections::HashMap;

use orca_model::{Point, Value, length_column_names, point_column_names};

/// One row: a key and the values recorded for it.
///
/// A column with no entry has no value recorded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    key: String,
    values: HashMap<String, Value>,
}

impl Record {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: HashMap::new(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.values.get(column)
    }

    pub fn number(&self, column: &str) -> Option<f64> {
        self.get(column).and_then(Value::as_f64)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.values.contains_key(column)
    }

    /// Point `name`, present only when both coordinates are.
    pub fn point(&self, name: &str) -> Option<Point> {
        let [x, y] = point_column_names(name);
        Some(Point::new(self.number(&x)?, self.number(&y)?))
    }

    /// Endpoints of segment `name`, present only when all four coordinates are.
    pub fn endpoints(&self, name: &str) -> Option<(Point, Point)> {
        let [xs, ys, xe, ye] = length_column_names(name);
        Some((
            Point::new(self.number(&xs)?, self.number(&ys)?),
            Point::new(self.number(&xe)?, self.number(&ye)?),
        ))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Set or clear `column`. Returns whether the stored value changed.
    pub fn set(&mut self, column: &str, value: Option<Value>) -> bool {
        match value {
            None => self.values.remove(column).is_some(),
            Some(value) => {
                if self.values.get(column) == Some(&value) {
                    return false;
                }
                self.values.insert(column.to_string(), value);
                true
            }
        }
    }
}
