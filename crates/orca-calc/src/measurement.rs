//! Derived measurement columns.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use orca_config::{ConfigFile, ConfigManager};
use orca_model::{ColumnSchema, Point, Value, ValueKind};
use orca_store::{ChangeSet, DataStore, DerivedUpdate, Record, RecordObserver};

use crate::calculator::Calculator;
use crate::config::{CalculatorItem, parse_items};
use crate::error::{CalcError, Result};
use crate::formula::MeasurementFunction;
use crate::rule::{Rule, compile};

/// Column a rule writes and the kind it is stored as.
#[derive(Debug, Clone)]
struct Output {
    column: String,
    kind: ValueKind,
}

#[derive(Debug)]
struct Plan {
    rules: Vec<Rule<MeasurementFunction>>,
    /// Written columns, parallel to `rules`.
    outputs: Vec<Vec<Output>>,
    /// Derived column -> (rule, output position).
    by_column: HashMap<String, (usize, usize)>,
    /// Configured target -> rule.
    by_target: HashMap<String, usize>,
    /// Input column -> rules reading it.
    dependents: HashMap<String, Vec<usize>>,
    /// Rule indices, inputs before the rules that read them.
    order: Vec<usize>,
}

/// Keeps derived columns consistent with their inputs.
///
/// Rules come from `MeasurementConf.json`. A rule is addressed by its target
/// or by any column it derives; a `parametric_point` rule targeting point `P`
/// derives `P_x` and `P_y`, which [`do_measurement`](Calculator::do_measurement)
/// evaluates one at a time and [`measure_point`](Self::measure_point) as a
/// whole. Derived columns belong to the manager: once registered, the store
/// rejects direct writes to them. When registered with a [`DataStore`] it recomputes every
/// affected derived column inside the write that changed an input, in
/// dependency order, so chains such as `copy -> length -> ratio` settle in
/// one pass.
#[derive(Debug, Clone)]
pub struct MeasurementManager {
    plan: Arc<Plan>,
}

impl MeasurementManager {
    /// Check `items` against `schema` and order them by dependency.
    pub fn new(items: &[CalculatorItem], schema: &ColumnSchema, file: &str) -> Result<Self> {
        let mut rules = Vec::with_capacity(items.len());
        let mut outputs = Vec::with_capacity(items.len());
        let mut by_column = HashMap::new();
        let mut by_target = HashMap::new();

        for item in items {
            if by_target.insert(item.target.clone(), rules.len()).is_some() {
                return Err(duplicate(file, &item.target));
            }
            let rule = compile::<MeasurementFunction>(item, schema, file)?;
            let written = target_outputs(&rule, schema, file)?;
            for (position, output) in written.iter().enumerate() {
                if by_column
                    .insert(output.column.clone(), (rules.len(), position))
                    .is_some()
                {
                    return Err(duplicate(file, &output.column));
                }
            }
            rules.push(rule);
            outputs.push(written);
        }

        let mut dependents: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, rule) in rules.iter().enumerate() {
            for column in rule.columns() {
                let readers = dependents.entry(column.to_string()).or_default();
                if !readers.contains(&index) {
                    readers.push(index);
                }
            }
        }

        let order = evaluation_order(&rules, &by_column, file)?;
        tracing::debug!(file, rules = rules.len(), "Compiled measurement rules");
        Ok(Self {
            plan: Arc::new(Plan {
                rules,
                outputs,
                by_column,
                by_target,
                dependents,
                order,
            }),
        })
    }

    /// Rules from the configuration directory, checked against `schema`.
    pub fn from_config(config: &ConfigManager, schema: &ColumnSchema) -> Result<Self> {
        let file = ConfigFile::MeasurementConf;
        let document = config.load_validated(file)?;
        let items = parse_items(document, file.filename())?;
        let manager = Self::new(&items, schema, file.filename())?;
        tracing::info!(
            path = %config.config_path(file.filename()).display(),
            rules = items.len(),
            "Loaded measurement rules"
        );
        Ok(manager)
    }

    /// Derived columns in evaluation order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.plan
            .order
            .iter()
            .flat_map(|&index| &self.plan.outputs[index])
            .map(|output| output.column.as_str())
    }

    pub fn is_derived(&self, column: &str) -> bool {
        self.plan.by_column.contains_key(column)
    }

    /// Rule addressed by a derived column or a target name.
    fn rule_index(&self, name: &str) -> Option<usize> {
        self.plan
            .by_column
            .get(name)
            .map(|&(index, _)| index)
            .or_else(|| self.plan.by_target.get(name).copied())
    }

    /// Point derived by the `parametric_point` rule targeting `target`.
    pub fn measure_point(
        &self,
        store: &DataStore,
        target: &str,
        key: &str,
    ) -> Result<Option<Point>> {
        let index = self
            .plan
            .by_target
            .get(target)
            .copied()
            .filter(|&index| {
                self.plan.rules[index].function == MeasurementFunction::ParametricPoint
            })
            .ok_or_else(|| CalcError::UnknownRule(target.to_string()))?;
        let Some(record) = store.record(key) else {
            return Ok(None);
        };
        let coordinates: Vec<f64> = self
            .evaluate(index, record)
            .into_iter()
            .filter_map(|(_, value)| value.as_ref().and_then(Value::as_f64))
            .collect();
        Ok(match coordinates[..] {
            [x, y] => Some(Point::new(x, y)),
            _ => None,
        })
    }

    /// Derived columns that read `column` directly.
    pub fn dependents_of(&self, column: &str) -> Vec<&str> {
        self.plan
            .dependents
            .get(column)
            .into_iter()
            .flatten()
            .flat_map(|&index| &self.plan.outputs[index])
            .map(|output| output.column.as_str())
            .collect()
    }

    /// Rules touched by `changes`, directly or through other derived columns.
    fn affected(&self, changes: ChangeSet<'_>) -> Vec<bool> {
        let columns = match changes {
            ChangeSet::All => return vec![true; self.plan.rules.len()],
            ChangeSet::Columns(columns) => columns,
        };
        let mut affected = vec![false; self.plan.rules.len()];
        let mut pending: VecDeque<&str> = columns.iter().map(String::as_str).collect();
        while let Some(column) = pending.pop_front() {
            for &index in self.plan.dependents.get(column).into_iter().flatten() {
                if !affected[index] {
                    affected[index] = true;
                    pending.extend(self.plan.outputs[index].iter().map(|o| o.column.as_str()));
                }
            }
        }
        affected
    }

    /// Values of every column written by rule `index`, from `record`.
    fn evaluate(&self, index: usize, record: &Record) -> Vec<(String, Option<Value>)> {
        let rule = &self.plan.rules[index];
        let outputs = &self.plan.outputs[index];
        let scalar = |value: Option<Value>| vec![(outputs[0].column.clone(), value)];

        match rule.function {
            MeasurementFunction::Copy => {
                let value = rule.inputs[0]
                    .column()
                    .and_then(|column| record.get(column))
                    .and_then(|value| convert(value, outputs[0].kind));
                scalar(value)
            }
            MeasurementFunction::Length => {
                let value = rule.numbers(record).and_then(|n| {
                    let length = Point::new(n[0], n[1]).distance(Point::new(n[2], n[3]));
                    numeric(length, outputs[0].kind)
                });
                scalar(value)
            }
            MeasurementFunction::Ratio => {
                let value = rule.numbers(record).and_then(|n| {
                    if n[1] == 0.0 {
                        None
                    } else {
                        numeric(n[0] / n[1], outputs[0].kind)
                    }
                });
                scalar(value)
            }
            MeasurementFunction::ParametricPoint => {
                let point = rule.numbers(record).map(|n| {
                    Point::new(n[0], n[1]).lerp(Point::new(n[2], n[3]), n[4])
                });
                vec![
                    (
                        outputs[0].column.clone(),
                        point.and_then(|p| numeric(p.x, outputs[0].kind)),
                    ),
                    (
                        outputs[1].column.clone(),
                        point.and_then(|p| numeric(p.y, outputs[1].kind)),
                    ),
                ]
            }
        }
    }
}

impl Calculator for MeasurementManager {
    type Output = Option<Value>;

    /// Subscribe to `store` and bring existing records up to date.
    fn register(&self, store: &mut DataStore) {
        store.subscribe(Box::new(self.clone()));
        store.recompute_all();
        tracing::debug!(rows = store.row_count(), "Registered measurement manager");
    }

    fn preflight_measurement(&self, store: &DataStore, rule: &str, key: &str) -> bool {
        let Some(index) = self.rule_index(rule) else {
            return false;
        };
        store
            .record(key)
            .is_some_and(|record| self.plan.rules[index].inputs_present(record))
    }

    fn do_measurement(&self, store: &DataStore, rule: &str, key: &str) -> Result<Option<Value>> {
        let (index, position) = match self.plan.by_column.get(rule) {
            Some(&found) => found,
            None => {
                let index = self
                    .plan
                    .by_target
                    .get(rule)
                    .copied()
                    .ok_or_else(|| CalcError::UnknownRule(rule.to_string()))?;
                let outputs = &self.plan.outputs[index];
                if outputs.len() != 1 {
                    return Err(CalcError::MultipleOutputs {
                        rule: rule.to_string(),
                        columns: outputs.iter().map(|o| o.column.clone()).collect(),
                    });
                }
                (index, 0)
            }
        };
        let Some(record) = store.record(key) else {
            return Ok(None);
        };
        Ok(self
            .evaluate(index, record)
            .swap_remove(position)
            .1)
    }
}

impl RecordObserver for MeasurementManager {
    fn owns(&self, column: &str) -> bool {
        self.is_derived(column)
    }

    fn derive(&self, record: &Record, changes: ChangeSet<'_>) -> Vec<DerivedUpdate> {
        let affected = self.affected(changes);
        let mut working = record.clone();
        let mut updates = Vec::new();
        for &index in &self.plan.order {
            if !affected[index] {
                continue;
            }
            for (column, value) in self.evaluate(index, &working) {
                if working.set(&column, value.clone()) {
                    updates.push(DerivedUpdate::new(column, value));
                }
            }
        }
        if !updates.is_empty() {
            tracing::debug!(
                key = record.key(),
                updated = updates.len(),
                "Recomputed derived measurements"
            );
        }
        updates
    }
}

fn duplicate(file: &str, target: &str) -> CalcError {
    CalcError::DuplicateTarget {
        file: file.to_string(),
        target: target.to_string(),
    }
}

/// A finite number stored as `kind`; integers are rounded.
fn numeric(value: f64, kind: ValueKind) -> Option<Value> {
    if !value.is_finite() {
        return None;
    }
    match kind {
        ValueKind::Integer => Some(Value::Integer(value.round() as i64)),
        ValueKind::Float => Some(Value::Float(value)),
        ValueKind::Text | ValueKind::Boolean => None,
    }
}

/// `value` as stored in a column of `kind`. Integers widen to floats.
fn convert(value: &Value, kind: ValueKind) -> Option<Value> {
    match (value, kind) {
        (Value::Integer(number), ValueKind::Float) => Some(Value::Float(*number as f64)),
        (value, kind) if value.kind() == kind => Some(value.clone()),
        _ => None,
    }
}

/// Columns written by `rule`, checked against `schema`.
fn target_outputs(
    rule: &Rule<MeasurementFunction>,
    schema: &ColumnSchema,
    file: &str,
) -> Result<Vec<Output>> {
    let incompatible = |reason: String| CalcError::IncompatibleTarget {
        file: file.to_string(),
        target: rule.target.clone(),
        function: rule.function.to_string(),
        reason,
    };
    let column = |name: &str| -> Result<Output> {
        let descriptor = schema.get(name).ok_or_else(|| CalcError::UnknownColumn {
            file: file.to_string(),
            target: rule.target.clone(),
            column: name.to_string(),
        })?;
        if descriptor.name == schema.key_column().name {
            return Err(incompatible("the record key cannot be derived".to_string()));
        }
        Ok(Output {
            column: descriptor.name.clone(),
            kind: descriptor.kind,
        })
    };

    match rule.function {
        MeasurementFunction::ParametricPoint => {
            let Some(columns) = schema.point_columns(&rule.target) else {
                return Err(incompatible(format!(
                    "'{}' is not a point with _x and _y columns",
                    rule.target
                )));
            };
            let outputs = columns
                .iter()
                .map(|name| column(name))
                .collect::<Result<Vec<_>>>()?;
            if let Some(output) = outputs.iter().find(|o| !o.kind.is_numeric()) {
                return Err(incompatible(format!(
                    "'{}' holds {} values",
                    output.column, output.kind
                )));
            }
            Ok(outputs)
        }
        MeasurementFunction::Length | MeasurementFunction::Ratio => {
            let output = column(&rule.target)?;
            if output.kind != ValueKind::Float {
                return Err(incompatible(format!(
                    "it holds {} values, expected float",
                    output.kind
                )));
            }
            Ok(vec![output])
        }
        MeasurementFunction::Copy => {
            let output = column(&rule.target)?;
            let source = rule.columns().next().and_then(|name| schema.get(name));
            if let Some(source) = source {
                let widens = source.kind == ValueKind::Integer && output.kind == ValueKind::Float;
                if source.kind != output.kind && !widens {
                    return Err(incompatible(format!(
                        "it holds {} values but '{}' holds {}",
                        output.kind, source.name, source.kind
                    )));
                }
            }
            Ok(vec![output])
        }
    }
}

/// Kahn's algorithm over "rule reads a column another rule writes".
fn evaluation_order(
    rules: &[Rule<MeasurementFunction>],
    by_column: &HashMap<String, (usize, usize)>,
    file: &str,
) -> Result<Vec<usize>> {
    let mut readers: Vec<Vec<usize>> = vec![Vec::new(); rules.len()];
    let mut in_degree = vec![0_usize; rules.len()];
    for (index, rule) in rules.iter().enumerate() {
        let producers: HashSet<usize> = rule
            .columns()
            .filter_map(|column| by_column.get(column).map(|&(producer, _)| producer))
            .collect();
        for producer in producers {
            readers[producer].push(index);
            in_degree[index] += 1;
        }
    }

    let mut ready: VecDeque<usize> = (0..rules.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(rules.len());
    while let Some(index) = ready.pop_front() {
        order.push(index);
        for &reader in &readers[index] {
            in_degree[reader] -= 1;
            if in_degree[reader] == 0 {
                ready.push_back(reader);
            }
        }
    }

    if order.len() < rules.len() {
        let targets = (0..rules.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| rules[i].target.clone())
            .collect();
        return Err(CalcError::Cycle {
            file: file.to_string(),
            targets,
        });
    }
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Parameter;
    use orca_model::ColumnDescriptor;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec![
            ColumnDescriptor::new("Filename", ValueKind::Text),
            ColumnDescriptor::new("A", ValueKind::Float),
            ColumnDescriptor::new("B", ValueKind::Float),
            ColumnDescriptor::new("C", ValueKind::Float),
            ColumnDescriptor::new("N", ValueKind::Integer),
            ColumnDescriptor::new("Note", ValueKind::Text),
        ])
        .unwrap()
    }

    fn copy(target: &str, source: &str) -> CalculatorItem {
        CalculatorItem::new(target, "copy", vec![Parameter::Text(source.into())])
    }

    fn build(items: &[CalculatorItem]) -> Result<MeasurementManager> {
        MeasurementManager::new(items, &schema(), "test.json")
    }

    #[test]
    fn order_follows_dependencies() {
        let manager = build(&[copy("C", "B"), copy("B", "A")]).unwrap();
        assert_eq!(manager.targets().collect::<Vec<_>>(), ["B", "C"]);
        assert_eq!(manager.dependents_of("A"), ["B"]);
        assert!(manager.is_derived("C"));
    }

    #[test]
    fn cycles_are_rejected() {
        let err = build(&[copy("B", "C"), copy("C", "B")]).unwrap_err();
        assert!(matches!(err, CalcError::Cycle { ref targets, .. } if targets.len() == 2));

        let err = build(&[copy("B", "B")]).unwrap_err();
        assert!(matches!(err, CalcError::Cycle { .. }));
    }

    #[test]
    fn duplicate_targets_are_rejected() {
        let err = build(&[copy("B", "A"), copy("B", "C")]).unwrap_err();
        assert!(matches!(err, CalcError::DuplicateTarget { ref target, .. } if target == "B"));
    }

    #[test]
    fn targets_must_fit_the_result() {
        let err = build(&[copy("Note", "A")]).unwrap_err();
        assert!(matches!(err, CalcError::IncompatibleTarget { .. }), "{err}");
        let err = build(&[copy("Filename", "Note")]).unwrap_err();
        assert!(matches!(err, CalcError::IncompatibleTarget { .. }), "{err}");
        let err = build(&[CalculatorItem::new(
            "N",
            "ratio",
            vec![Parameter::Text("A".into()), Parameter::Text("B".into())],
        )])
        .unwrap_err();
        assert!(matches!(err, CalcError::IncompatibleTarget { .. }), "{err}");

        assert!(build(&[copy("A", "N")]).is_ok());
    }

    #[test]
    fn parameters_are_checked() {
        let err = build(&[CalculatorItem::new("A", "sum", vec![])]).unwrap_err();
        assert!(matches!(err, CalcError::UnknownFunction { .. }));

        let err = build(&[CalculatorItem::new(
            "A",
            "ratio",
            vec![Parameter::Text("B".into())],
        )])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "test.json: 'A': ratio takes 2 parameters, got 1"
        );

        let err = build(&[copy("A", "Missing")]).unwrap_err();
        assert!(matches!(err, CalcError::UnknownColumn { ref column, .. } if column == "Missing"));

        let err = build(&[CalculatorItem::new(
            "A",
            "ratio",
            vec![Parameter::Text("Note".into()), Parameter::Number(2.0)],
        )])
        .unwrap_err();
        assert!(matches!(err, CalcError::NonNumericColumn { .. }));
    }

    #[test]
    fn chained_rules_settle_in_one_pass() {
        let manager = build(&[
            CalculatorItem::new(
                "C",
                "ratio",
                vec![Parameter::Text("B".into()), Parameter::Number(4.0)],
            ),
            copy("B", "A"),
        ])
        .unwrap();

        let mut record = Record::new("img.jpg");
        record.set("A", Some(Value::Float(10.0)));
        let changed = ["A".to_string()];
        let updates = manager.derive(&record, ChangeSet::Columns(&changed));
        assert_eq!(
            updates,
            [
                DerivedUpdate::new("B", Some(Value::Float(10.0))),
                DerivedUpdate::new("C", Some(Value::Float(2.5))),
            ]
        );

        let unrelated = ["Note".to_string()];
        assert!(manager.derive(&record, ChangeSet::Columns(&unrelated)).is_empty());
    }

    #[test]
    fn ratio_by_zero_is_absent() {
        let manager = build(&[CalculatorItem::new(
            "C",
            "ratio",
            vec![Parameter::Text("A".into()), Parameter::Text("B".into())],
        )])
        .unwrap();
        let mut record = Record::new("img.jpg");
        record.set("A", Some(Value::Float(1.0)));
        record.set("B", Some(Value::Float(0.0)));
        record.set("C", Some(Value::Float(9.0)));

        let updates = manager.derive(&record, ChangeSet::All);
        assert_eq!(updates, [DerivedUpdate::new("C", None)]);
    }
}
