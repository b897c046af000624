//! Mapping from column units to value kinds.

use std::collections::{HashMap, HashSet};

use crate::value::ValueKind;

const INTEGER_UNITS: &[&str] = &["count"];
const TEXT_UNITS: &[&str] = &["text", "timestamp", "fractional degrees", "editable text"];
const FLOAT_UNITS: &[&str] = &[
    "pixels",
    "meters",
    "millimeters",
    "unitless percentage",
    "fractional pixels",
];
const BOOLEAN_UNITS: &[&str] = &["boolean"];
const EDITABLE_UNITS: &[&str] = &["editable text"];

/// Decides the value kind of a column from its `units` cell.
#[derive(Debug, Clone)]
pub struct UnitCatalog {
    kinds: HashMap<String, ValueKind>,
    editable: HashSet<String>,
}

impl Default for UnitCatalog {
    fn default() -> Self {
        let mut catalog = Self::empty();
        for (units, kind) in [
            (INTEGER_UNITS, ValueKind::Integer),
            (TEXT_UNITS, ValueKind::Text),
            (FLOAT_UNITS, ValueKind::Float),
            (BOOLEAN_UNITS, ValueKind::Boolean),
        ] {
            for unit in units {
                catalog.insert(unit, kind);
            }
        }
        catalog.editable = EDITABLE_UNITS.iter().map(|u| (*u).to_string()).collect();
        catalog
    }
}

impl UnitCatalog {
    pub fn empty() -> Self {
        Self {
            kinds: HashMap::new(),
            editable: HashSet::new(),
        }
    }

    /// Register (or re-map) a unit.
    pub fn insert(&mut self, unit: &str, kind: ValueKind) {
        self.kinds.insert(unit.to_string(), kind);
    }

    pub fn mark_editable(&mut self, unit: &str) {
        self.editable.insert(unit.to_string());
    }

    pub fn kind_of(&self, unit: &str) -> Option<ValueKind> {
        self.kinds.get(unit).copied()
    }

    pub fn is_editable_unit(&self, unit: &str) -> bool {
        self.editable.contains(unit)
    }

    /// Units registered for `kind`, sorted.
    pub fn units_of(&self, kind: ValueKind) -> Vec<&str> {
        let mut units: Vec<&str> = self
            .kinds
            .iter()
            .filter(|(_, k)| **k == kind)
            .map(|(unit, _)| unit.as_str())
            .collect();
        units.sort_unstable();
        units
    }
}
