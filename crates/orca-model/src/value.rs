//! Scalar cell values and their text encoding.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};

/// Cell text that loads as "no value recorded".
pub const MISSING_TOKEN: &str = "NA";

/// Declared kind of a scalar column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Integer,
    Float,
    Text,
    Boolean,
}

impl ValueKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::Text => "text",
            ValueKind::Boolean => "boolean",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueKind::Integer | ValueKind::Float)
    }

    /// Parse one CSV cell. Empty cells and `NA` are absent.
    ///
    /// Integer cells written with a fractional part (`3.0`) are truncated.
    pub fn parse_cell(self, raw: &str) -> Result<Option<Value>> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == MISSING_TOKEN {
            return Ok(None);
        }
        let invalid = || ModelError::InvalidCell {
            kind: self,
            raw: trimmed.to_string(),
        };
        let value = match self {
            ValueKind::Text => Value::Text(trimmed.to_string()),
            ValueKind::Float => Value::Float(trimmed.parse().map_err(|_| invalid())?),
            ValueKind::Integer => match trimmed.parse::<i64>() {
                Ok(parsed) => Value::Integer(parsed),
                Err(_) => {
                    let parsed: f64 = trimmed.parse().map_err(|_| invalid())?;
                    if !parsed.is_finite() {
                        return Err(invalid());
                    }
                    Value::Integer(parsed.trunc() as i64)
                }
            },
            ValueKind::Boolean => {
                if trimmed.eq_ignore_ascii_case("true") {
                    Value::Boolean(true)
                } else if trimmed.eq_ignore_ascii_case("false") {
                    Value::Boolean(false)
                } else {
                    return Err(invalid());
                }
            }
        };
        Ok(Some(value))
    }

    /// Cell text written for an absent value of this kind.
    pub fn missing_cell(self) -> &'static str {
        if self.is_numeric() { MISSING_TOKEN } else { "" }
    }

    /// Encode an optional value as CSV cell text.
    pub fn format_cell(self, value: Option<&Value>) -> String {
        match value {
            Some(value) => value.to_string(),
            None => self.missing_cell().to_string(),
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A present scalar value. Absence is modelled as `Option::None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Integer(_) => ValueKind::Integer,
            Value::Float(_) => ValueKind::Float,
            Value::Text(_) => ValueKind::Text,
            Value::Boolean(_) => ValueKind::Boolean,
        }
    }

    /// Numeric view used by calculators; integers widen to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Integer(value) => Some(*value as f64),
            Value::Float(value) => Some(*value),
            Value::Text(_) | Value::Boolean(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    /// Whether the cell text of this value parses back to the same value.
    ///
    /// Cells are trimmed and `""`/`NA` read as absent, so empty, padded and
    /// `NA` text have no cell form.
    pub fn has_cell_form(&self) -> bool {
        match self {
            Value::Text(text) => {
                !text.is_empty() && text.trim() == text.as_str() && text != MISSING_TOKEN
            }
            Value::Integer(_) | Value::Float(_) | Value::Boolean(_) => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(value) => write!(f, "{value}"),
            // `Display` for f64 is the shortest text that parses back to the same bits.
            Value::Float(value) => write!(f, "{value}"),
            Value::Text(value) => f.write_str(value),
            Value::Boolean(value) => write!(f, "{value}"),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn missing_tokens_parse_as_absent() {
        for kind in [
            ValueKind::Integer,
            ValueKind::Float,
            ValueKind::Text,
            ValueKind::Boolean,
        ] {
            assert_eq!(kind.parse_cell("").unwrap(), None);
            assert_eq!(kind.parse_cell("  NA ").unwrap(), None);
        }
    }

    #[test]
    fn integer_cells_truncate_fractions() {
        assert_eq!(
            ValueKind::Integer.parse_cell("3.0").unwrap(),
            Some(Value::Integer(3))
        );
        assert_eq!(
            ValueKind::Integer.parse_cell("-7.9").unwrap(),
            Some(Value::Integer(-7))
        );
    }

    #[test]
    fn malformed_cells_are_rejected() {
        let err = ValueKind::Float.parse_cell("abc").unwrap_err();
        assert_eq!(err.to_string(), "'abc' is not a valid float value");
        assert!(ValueKind::Boolean.parse_cell("yes").is_err());
        assert!(ValueKind::Integer.parse_cell("inf").is_err());
    }

    #[test]
    fn booleans_ignore_case() {
        assert_eq!(
            ValueKind::Boolean.parse_cell("TRUE").unwrap(),
            Some(Value::Boolean(true))
        );
        assert_eq!(
            ValueKind::Boolean.parse_cell("False").unwrap(),
            Some(Value::Boolean(false))
        );
    }

    #[test]
    fn absent_cells_by_kind() {
        assert_eq!(ValueKind::Float.format_cell(None), "NA");
        assert_eq!(ValueKind::Integer.format_cell(None), "NA");
        assert_eq!(ValueKind::Text.format_cell(None), "");
        assert_eq!(ValueKind::Boolean.format_cell(None), "");
    }

    #[test]
    fn text_without_cell_form() {
        for text in ["", "NA", " padded", "padded\t"] {
            assert!(!Value::from(text).has_cell_form(), "{text:?}");
        }
        assert!(Value::from("left side, partial").has_cell_form());
        assert!(Value::from("na").has_cell_form());
        assert!(Value::Float(0.5).has_cell_form());
    }

    #[test]
    fn values_serialize_untagged() {
        let values = vec![
            Value::Integer(12),
            Value::Float(0.5),
            Value::from("left side"),
            Value::Boolean(true),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[12,0.5,"left side",true]"#);
        assert_eq!(serde_json::to_string(&ValueKind::Float).unwrap(), r#""float""#);
    }

    proptest! {
        #[test]
        fn float_cells_round_trip(value in proptest::num::f64::NORMAL | proptest::num::f64::ZERO) {
            let cell = ValueKind::Float.format_cell(Some(&Value::Float(value)));
            prop_assert_eq!(ValueKind::Float.parse_cell(&cell).unwrap(), Some(Value::Float(value)));
        }

        #[test]
        fn integer_cells_round_trip(value in any::<i64>()) {
            let cell = ValueKind::Integer.format_cell(Some(&Value::Integer(value)));
            prop_assert_eq!(ValueKind::Integer.parse_cell(&cell).unwrap(), Some(Value::Integer(value)));
        }
    }
}
