//! Calculator configuration items as stored in `MeasurementConf.json` and
//! `ReferenceConf.json`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use orca_config::ConfigError;

use crate::error::Result;

/// One raw parameter: a string or a number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameter {
    Number(f64),
    Text(String),
}

/// How a parameter is used once classified.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Argument<'a> {
    /// Name of a column read from the record.
    Column(&'a str),
    /// Quoted string literal, quotes removed.
    Literal(&'a str),
    Number(f64),
}

impl Parameter {
    /// A string containing a double quote is a literal; any other string
    /// names a column.
    pub fn argument(&self) -> Argument<'_> {
        match self {
            Parameter::Number(number) => Argument::Number(*number),
            Parameter::Text(text) if text.contains('"') => Argument::Literal(text.trim_matches('"')),
            Parameter::Text(text) => Argument::Column(text),
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Number(number) => write!(f, "{number}"),
            Parameter::Text(text) => f.write_str(text),
        }
    }
}

/// A single calculator rule: `target = function(parameters...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalculatorItem {
    pub target: String,
    pub function: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Label template for reference markers; `{}` is replaced by the percentage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl CalculatorItem {
    pub fn new(
        target: impl Into<String>,
        function: impl Into<String>,
        parameters: Vec<Parameter>,
    ) -> Self {
        Self {
            target: target.into(),
            function: function.into(),
            parameters,
            label: None,
        }
    }

    /// Column names among the parameters, in order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().filter_map(|p| match p.argument() {
            Argument::Column(column) => Some(column),
            _ => None,
        })
    }
}

impl fmt::Display for CalculatorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}(", self.target, self.function)?;
        for (index, parameter) in self.parameters.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{parameter}")?;
        }
        f.write_str(")")
    }
}

/// Decode an already validated configuration document.
pub fn parse_items(document: JsonValue, source_name: &str) -> Result<Vec<CalculatorItem>> {
    serde_json::from_value(document).map_err(|e| {
        ConfigError::ConfigLoad {
            file: source_name.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}
