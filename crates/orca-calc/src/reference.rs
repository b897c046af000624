//! Reference cue rules.

use std::collections::HashMap;

use orca_config::{ConfigFile, ConfigManager};
use orca_model::{ColumnSchema, Point};
use orca_store::{DataStore, Record};

use crate::calculator::Calculator;
use crate::config::{CalculatorItem, parse_items};
use crate::error::{CalcError, Result};
use crate::formula::ReferenceFunction;
use crate::geometry::{self, DEFAULT_MEASUREMENT_LABEL, TickRange};
use crate::markers::ReferenceMarkers;
use crate::rule::{Rule, compile};

/// Computes drawing cues (axes, tick marks, landmarks) from a record.
///
/// Rules come from `ReferenceConf.json` and are addressed by their target
/// name. Nothing is written back to the store.
#[derive(Debug, Clone)]
pub struct ReferenceCalculator {
    rules: Vec<Rule<ReferenceFunction>>,
    by_target: HashMap<String, usize>,
}

impl ReferenceCalculator {
    pub fn new(items: &[CalculatorItem], schema: &ColumnSchema, file: &str) -> Result<Self> {
        let mut rules = Vec::with_capacity(items.len());
        let mut by_target = HashMap::new();
        for item in items {
            let rule = compile::<ReferenceFunction>(item, schema, file)?;
            if let Some(index) = rule.function.step_index()
                && let Some(step) = rule.inputs[index].literal_number()
                && step <= 0.0
            {
                return Err(CalcError::InvalidParameter {
                    file: file.to_string(),
                    target: item.target.clone(),
                    index,
                    reason: format!("interval step must be positive, got {step}"),
                });
            }
            if by_target.insert(item.target.clone(), rules.len()).is_some() {
                return Err(CalcError::DuplicateTarget {
                    file: file.to_string(),
                    target: item.target.clone(),
                });
            }
            rules.push(rule);
        }
        tracing::debug!(file, rules = rules.len(), "Compiled reference rules");
        Ok(Self { rules, by_target })
    }

    pub fn from_config(config: &ConfigManager, schema: &ColumnSchema) -> Result<Self> {
        let file = ConfigFile::ReferenceConf;
        let document = config.load_validated(file)?;
        let items = parse_items(document, file.filename())?;
        let calculator = Self::new(&items, schema, file.filename())?;
        tracing::info!(
            path = %config.config_path(file.filename()).display(),
            rules = items.len(),
            "Loaded reference rules"
        );
        Ok(calculator)
    }

    /// Rule names in file order.
    pub fn rules(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.target.as_str())
    }

    pub fn has_rule(&self, rule: &str) -> bool {
        self.by_target.contains_key(rule)
    }

    fn rule(&self, name: &str) -> Result<&Rule<ReferenceFunction>> {
        self.by_target
            .get(name)
            .map(|&index| &self.rules[index])
            .ok_or_else(|| CalcError::UnknownRule(name.to_string()))
    }
}

impl Calculator for ReferenceCalculator {
    type Output = ReferenceMarkers;

    fn preflight_measurement(&self, store: &DataStore, rule: &str, key: &str) -> bool {
        let Ok(rule) = self.rule(rule) else {
            return false;
        };
        store
            .record(key)
            .is_some_and(|record| rule.inputs_present(record))
    }

    fn do_measurement(&self, store: &DataStore, rule: &str, key: &str) -> Result<ReferenceMarkers> {
        let compiled = self.rule(rule)?;
        let Some(record) = store.record(key) else {
            return Ok(ReferenceMarkers::new());
        };
        Ok(markers(compiled, record).unwrap_or_default())
    }
}

fn segment(n: &[f64]) -> (Point, Point) {
    (Point::new(n[0], n[1]), Point::new(n[2], n[3]))
}

/// Markers for one rule, or `None` when an input is absent.
fn markers(rule: &Rule<ReferenceFunction>, record: &Record) -> Option<ReferenceMarkers> {
    let n = rule.numbers(record)?;
    let markers = match rule.function {
        ReferenceFunction::ComputeOffsetReferenceMarkers => geometry::offset_reference_markers(
            segment(&n[0..4]),
            segment(&n[4..8]),
            &n[8..],
            rule.label.as_deref().unwrap_or(DEFAULT_MEASUREMENT_LABEL),
        ),
        ReferenceFunction::IntervalReferenceMarkers => {
            let axis = segment(&n[0..4]);
            let range = TickRange {
                start: n[4],
                end: n[5],
                step: n[6],
            };
            geometry::interval_markers(axis, axis, range, 0.0)
        }
        ReferenceFunction::IntervalReferenceMarkersWithBaseLength => {
            let range = TickRange {
                start: n[8],
                end: n[9],
                step: n[10],
            };
            geometry::interval_markers(segment(&n[0..4]), segment(&n[4..8]), range, n[11])
        }
        ReferenceFunction::DrawRefAlongLine => geometry::point_along_line(segment(&n[0..4]), n[4]),
        ReferenceFunction::RenderLandmark => {
            geometry::landmark(rule.label_input()?, Point::new(n[0], n[1]))
        }
    };
    Some(markers)
}
