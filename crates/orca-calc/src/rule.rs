//! Compiled calculator rules.
//!
//! A [`CalculatorItem`] is checked once against the column schema and turned
//! into a [`Rule`] whose inputs are already classified, so evaluation only
//! has to look values up.

use std::fmt;

use orca_model::ColumnSchema;
use orca_store::Record;

use crate::config::{Argument, CalculatorItem};
use crate::error::{CalcError, Result};

/// What a parameter position accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    /// Numeric column or number literal.
    Number,
    /// Column of any kind.
    Column,
    /// Quoted string literal.
    Label,
}

/// Parameter layout of a function.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Signature {
    pub fixed: &'static [Slot],
    /// Slot for one or more trailing parameters.
    pub repeated: Option<Slot>,
}

impl Signature {
    pub const fn exact(fixed: &'static [Slot]) -> Self {
        Self {
            fixed,
            repeated: None,
        }
    }

    fn accepts(&self, count: usize) -> bool {
        match self.repeated {
            None => count == self.fixed.len(),
            Some(_) => count > self.fixed.len(),
        }
    }

    fn expected(&self) -> String {
        match self.repeated {
            None => self.fixed.len().to_string(),
            Some(_) => format!("at least {}", self.fixed.len() + 1),
        }
    }

    fn slot(&self, index: usize) -> Option<Slot> {
        self.fixed.get(index).copied().or(self.repeated)
    }
}

/// A function a calculator knows how to evaluate.
pub(crate) trait Function: Copy + fmt::Display {
    fn parse(name: &str) -> Option<Self>;
    fn signature(self) -> Signature;
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Input {
    Column(String),
    Number(f64),
    Label(String),
}

impl Input {
    pub fn column(&self) -> Option<&str> {
        match self {
            Input::Column(column) => Some(column),
            _ => None,
        }
    }

    /// Numeric value of this input for `record`; absent if the column is.
    pub fn number(&self, record: &Record) -> Option<f64> {
        match self {
            Input::Column(column) => record.number(column),
            Input::Number(number) => Some(*number),
            Input::Label(_) => None,
        }
    }

    pub fn literal_number(&self) -> Option<f64> {
        match self {
            Input::Number(number) => Some(*number),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Rule<F> {
    pub target: String,
    pub function: F,
    pub inputs: Vec<Input>,
    pub label: Option<String>,
}

impl<F> Rule<F> {
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.inputs.iter().filter_map(Input::column)
    }

    /// Whether every column input has a value in `record`.
    pub fn inputs_present(&self, record: &Record) -> bool {
        self.columns().all(|column| record.contains(column))
    }

    /// Every numeric input, or `None` if any is absent.
    pub fn numbers(&self, record: &Record) -> Option<Vec<f64>> {
        self.inputs
            .iter()
            .filter(|input| !matches!(input, Input::Label(_)))
            .map(|input| input.number(record))
            .collect()
    }

    pub fn label_input(&self) -> Option<&str> {
        self.inputs.iter().find_map(|input| match input {
            Input::Label(label) => Some(label.as_str()),
            _ => None,
        })
    }
}

/// Check `item` against `schema` and classify its parameters.
pub(crate) fn compile<F: Function>(
    item: &CalculatorItem,
    schema: &ColumnSchema,
    file: &str,
) -> Result<Rule<F>> {
    let function = F::parse(&item.function).ok_or_else(|| CalcError::UnknownFunction {
        file: file.to_string(),
        target: item.target.clone(),
        function: item.function.clone(),
    })?;
    let signature = function.signature();
    if !signature.accepts(item.parameters.len()) {
        return Err(CalcError::Arity {
            file: file.to_string(),
            target: item.target.clone(),
            function: item.function.clone(),
            expected: signature.expected(),
            found: item.parameters.len(),
        });
    }

    let invalid = |index: usize, reason: &str| CalcError::InvalidParameter {
        file: file.to_string(),
        target: item.target.clone(),
        index,
        reason: reason.to_string(),
    };

    let mut inputs = Vec::with_capacity(item.parameters.len());
    for (index, parameter) in item.parameters.iter().enumerate() {
        let Some(slot) = signature.slot(index) else {
            return Err(invalid(index, "unexpected parameter"));
        };
        let input = match (slot, parameter.argument()) {
            (Slot::Number | Slot::Column, Argument::Column(column)) => {
                let descriptor = schema.get(column).ok_or_else(|| CalcError::UnknownColumn {
                    file: file.to_string(),
                    target: item.target.clone(),
                    column: column.to_string(),
                })?;
                if slot == Slot::Number && !descriptor.kind.is_numeric() {
                    return Err(CalcError::NonNumericColumn {
                        file: file.to_string(),
                        target: item.target.clone(),
                        column: column.to_string(),
                        kind: descriptor.kind,
                    });
                }
                Input::Column(column.to_string())
            }
            (Slot::Number, Argument::Number(number)) => Input::Number(number),
            (Slot::Number, Argument::Literal(_)) => {
                return Err(invalid(index, "expected a column or a number"));
            }
            (Slot::Column, _) => return Err(invalid(index, "expected a column name")),
            (Slot::Label, Argument::Literal(label)) => Input::Label(label.to_string()),
            (Slot::Label, _) => return Err(invalid(index, "expected a quoted label")),
        };
        inputs.push(input);
    }

    Ok(Rule {
        target: item.target.clone(),
        function,
        inputs,
        label: item.label.clone(),
    })
}
