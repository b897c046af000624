//! Offline JSON Schema validation for configuration documents.
//!
//! Supports the draft-07 keywords the bundled schemas use: `type`, `enum`,
//! `const`, `required`, `properties`, `additionalProperties`, `items`,
//! `minItems`/`maxItems`, `minimum`/`maximum`, `minLength`/`maxLength`,
//! `pattern`, `allOf`/`anyOf`/`oneOf`/`not` and `$ref`, plus the annotations
//! in [`ANNOTATION_KEYWORDS`]. A schema using any other keyword is rejected
//! when it is added. External `$ref` URLs are redirected to bundled copies
//! through `schema-map.json`, so validation never touches the network.

use std::collections::HashMap;
use std::fmt;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::embedded::{self, BUNDLED_SCHEMA_PREFIX};
use crate::error::{ConfigError, Result};

const MAX_REF_DEPTH: usize = 32;
const ROOT_PATH: &str = "$";

/// Keywords checked by [`SchemaValidator`].
pub const VALIDATION_KEYWORDS: &[&str] = &[
    "type",
    "enum",
    "const",
    "required",
    "properties",
    "additionalProperties",
    "items",
    "minItems",
    "maxItems",
    "minimum",
    "maximum",
    "minLength",
    "maxLength",
    "pattern",
    "allOf",
    "anyOf",
    "oneOf",
    "not",
    "$ref",
];

/// Keywords accepted in a schema but never checked.
pub const ANNOTATION_KEYWORDS: &[&str] = &[
    "$schema",
    "$id",
    "$comment",
    "title",
    "description",
    "default",
    "examples",
    "definitions",
];

/// One schema violation, located by a JSONPath-style pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub path: String,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

#[derive(Deserialize)]
struct SchemaMapping {
    #[serde(rename = "publicURL")]
    public_url: String,
    #[serde(rename = "localURL")]
    local_url: String,
}

/// Validates documents against the bundled schemas.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schemas: HashMap<String, Value>,
    urls: HashMap<String, String>,
}

impl SchemaValidator {
    /// Validator over every schema embedded in this crate.
    pub fn bundled() -> Result<Self> {
        let mappings: Vec<SchemaMapping> =
            serde_json::from_str(embedded::SCHEMA_MAP).map_err(|e| ConfigError::ConfigLoad {
                file: "schema-map.json".to_string(),
                message: e.to_string(),
            })?;
        let urls = mappings
            .into_iter()
            .map(|mapping| (mapping.public_url, mapping.local_url))
            .collect();
        let mut validator = Self {
            schemas: HashMap::with_capacity(embedded::SCHEMAS.len()),
            urls,
        };
        for (name, text) in embedded::SCHEMAS {
            let schema = serde_json::from_str(text).map_err(|e| ConfigError::ConfigLoad {
                file: (*name).to_string(),
                message: e.to_string(),
            })?;
            validator.insert_schema(name, schema)?;
        }
        Ok(validator)
    }

    /// Add (or replace) a schema under `name`.
    ///
    /// Fails when the schema uses a keyword outside [`VALIDATION_KEYWORDS`]
    /// and [`ANNOTATION_KEYWORDS`], so nothing is silently left unchecked.
    pub fn insert_schema(&mut self, name: &str, schema: Value) -> Result<()> {
        let mut unsupported = Vec::new();
        unsupported_keywords(&schema, ROOT_PATH, &mut unsupported);
        if !unsupported.is_empty() {
            return Err(ConfigError::ConfigLoad {
                file: name.to_string(),
                message: format!("unsupported schema keyword(s): {}", unsupported.join(", ")),
            });
        }
        self.schemas.insert(name.to_string(), schema);
        Ok(())
    }

    pub fn has_schema(&self, schema_name: &str) -> bool {
        self.schemas.contains_key(schema_name)
    }

    /// Every violation of `schema_name` found in `document`.
    ///
    /// Fails only when the schema itself cannot be resolved.
    pub fn violations(&self, document: &Value, schema_name: &str) -> Result<Vec<Violation>> {
        let root = self
            .schemas
            .get(schema_name)
            .ok_or_else(|| ConfigError::UnknownSchema(schema_name.to_string()))?;
        let mut pass = Pass {
            validator: self,
            patterns: HashMap::new(),
            found: Vec::new(),
        };
        pass.check(root, root, document, ROOT_PATH, 0)?;
        Ok(pass.found)
    }

    pub fn validate(&self, document: &Value, schema_name: &str) -> Result<()> {
        self.validate_named(document, schema_name, schema_name)
    }

    /// Like [`validate`](Self::validate), naming `source_name` in the error.
    pub fn validate_named(
        &self,
        document: &Value,
        schema_name: &str,
        source_name: &str,
    ) -> Result<()> {
        let violations = self.violations(document, schema_name)?;
        if violations.is_empty() {
            tracing::debug!(source = source_name, schema = schema_name, "Configuration valid");
            return Ok(());
        }
        tracing::debug!(
            source = source_name,
            schema = schema_name,
            count = violations.len(),
            "Configuration failed validation"
        );
        Err(ConfigError::Validation {
            source_name: source_name.to_string(),
            violations: violations.iter().map(ToString::to_string).collect(),
        })
    }

    /// Parse `text` as JSON and validate it, returning the parsed document.
    pub fn validate_text(&self, text: &str, schema_name: &str, source_name: &str) -> Result<Value> {
        let document: Value = serde_json::from_str(text).map_err(|e| ConfigError::ConfigLoad {
            file: source_name.to_string(),
            message: e.to_string(),
        })?;
        self.validate_named(&document, schema_name, source_name)?;
        Ok(document)
    }

    /// Resolve a `$ref` into (document root, target schema).
    fn resolve<'a>(&'a self, root: &'a Value, reference: &str) -> Result<(&'a Value, &'a Value)> {
        let (base, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let document = if base.is_empty() {
            root
        } else {
            let local = self.urls.get(base).map_or(base, String::as_str);
            let name = local.strip_prefix(BUNDLED_SCHEMA_PREFIX).unwrap_or(local);
            self.schemas
                .get(name)
                .ok_or_else(|| ConfigError::UnknownSchema(reference.to_string()))?
        };
        let target = if fragment.is_empty() {
            document
        } else {
            document
                .pointer(fragment)
                .ok_or_else(|| ConfigError::UnknownSchema(reference.to_string()))?
        };
        Ok((document, target))
    }
}

/// JSON type name as reported in violations.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Locations of keywords the validator does not understand, recursing into
/// every subschema position.
fn unsupported_keywords(schema: &Value, path: &str, found: &mut Vec<String>) {
    let Value::Object(keywords) = schema else {
        return;
    };
    for (name, value) in keywords {
        let located = child_path(path, name);
        if !VALIDATION_KEYWORDS.contains(&name.as_str())
            && !ANNOTATION_KEYWORDS.contains(&name.as_str())
        {
            found.push(located);
            continue;
        }
        match (name.as_str(), value) {
            ("properties" | "definitions", Value::Object(children)) => {
                for (child, subschema) in children {
                    unsupported_keywords(subschema, &child_path(&located, child), found);
                }
            }
            ("items" | "allOf" | "anyOf" | "oneOf", Value::Array(subschemas)) => {
                for (index, subschema) in subschemas.iter().enumerate() {
                    unsupported_keywords(subschema, &index_path(&located, index), found);
                }
            }
            ("items" | "additionalProperties" | "not", subschema) => {
                unsupported_keywords(subschema, &located, found);
            }
            _ => {}
        }
    }
}

fn type_matches(expected: &str, value: &Value) -> bool {
    match expected {
        "number" => value.is_number(),
        // Draft-07 counts any number without a fractional part.
        "integer" => value.as_f64().is_some_and(|n| n.fract() == 0.0),
        "null" | "boolean" | "string" | "array" | "object" => type_name(value) == expected,
        _ => true,
    }
}

fn child_path(path: &str, property: &str) -> String {
    format!("{path}.{property}")
}

fn index_path(path: &str, index: usize) -> String {
    format!("{path}[{index}]")
}

fn as_limit(schema: &Map<String, Value>, keyword: &str) -> Option<f64> {
    schema.get(keyword).and_then(Value::as_f64)
}

fn as_count(schema: &Map<String, Value>, keyword: &str) -> Option<usize> {
    schema
        .get(keyword)
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

/// State of one validation run.
struct Pass<'a> {
    validator: &'a SchemaValidator,
    patterns: HashMap<String, Regex>,
    found: Vec<Violation>,
}

impl<'a> Pass<'a> {
    fn push(&mut self, path: &str, message: String) {
        self.found.push(Violation {
            path: path.to_string(),
            message,
        });
    }

    /// Violations of `schema` alone, without recording them.
    fn trial_run(
        &mut self,
        root: &'a Value,
        schema: &'a Value,
        instance: &Value,
        path: &str,
        depth: usize,
    ) -> Result<Vec<Violation>> {
        let saved = std::mem::take(&mut self.found);
        let outcome = self.check(root, schema, instance, path, depth);
        let trial = std::mem::replace(&mut self.found, saved);
        outcome.map(|()| trial)
    }

    fn check(
        &mut self,
        root: &'a Value,
        schema: &'a Value,
        instance: &Value,
        path: &str,
        depth: usize,
    ) -> Result<()> {
        let keywords = match schema {
            Value::Object(keywords) => keywords,
            Value::Bool(false) => {
                self.push(path, "is not allowed".to_string());
                return Ok(());
            }
            _ => return Ok(()),
        };
        if depth > MAX_REF_DEPTH {
            return Err(ConfigError::UnknownSchema(format!(
                "$ref nesting exceeds {MAX_REF_DEPTH} levels at {path}"
            )));
        }

        // Draft-07: keywords beside `$ref` are ignored.
        if let Some(reference) = keywords.get("$ref").and_then(Value::as_str) {
            let (ref_root, target) = self.validator.resolve(root, reference)?;
            return self.check(ref_root, target, instance, path, depth + 1);
        }

        if !self.check_type(keywords, instance, path) {
            return Ok(());
        }

        if let Some(options) = keywords.get("enum").and_then(Value::as_array)
            && !options.contains(instance)
        {
            let listed: Vec<String> = options.iter().map(ToString::to_string).collect();
            self.push(
                path,
                format!("does not have a value in the enumeration [{}]", listed.join(", ")),
            );
        }
        if let Some(expected) = keywords.get("const")
            && expected != instance
        {
            self.push(path, format!("must be the constant value {expected}"));
        }

        match instance {
            Value::Object(object) => self.check_object(root, keywords, object, path, depth)?,
            Value::Array(items) => self.check_array(root, keywords, items, path, depth)?,
            Value::String(text) => self.check_string(keywords, text, path)?,
            Value::Number(number) => {
                if let Some(value) = number.as_f64() {
                    self.check_number(keywords, value, path);
                }
            }
            Value::Null | Value::Bool(_) => {}
        }

        self.check_combinators(root, keywords, instance, path, depth)
    }

    /// Returns false when the instance has the wrong type.
    fn check_type(&mut self, keywords: &Map<String, Value>, instance: &Value, path: &str) -> bool {
        let allowed: Vec<&str> = match keywords.get("type") {
            Some(Value::String(single)) => vec![single.as_str()],
            Some(Value::Array(many)) => many.iter().filter_map(Value::as_str).collect(),
            _ => return true,
        };
        if allowed.is_empty() || allowed.iter().any(|t| type_matches(t, instance)) {
            return true;
        }
        let expected = match allowed.as_slice() {
            [single] => (*single).to_string(),
            many => format!("[{}]", many.join(", ")),
        };
        self.push(
            path,
            format!("{} found, {expected} expected", type_name(instance)),
        );
        false
    }

    fn check_object(
        &mut self,
        root: &'a Value,
        keywords: &'a Map<String, Value>,
        object: &Map<String, Value>,
        path: &str,
        depth: usize,
    ) -> Result<()> {
        if let Some(required) = keywords.get("required").and_then(Value::as_array) {
            for name in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(name) {
                    self.push(
                        &child_path(path, name),
                        "is missing but it is required".to_string(),
                    );
                }
            }
        }

        let properties = keywords.get("properties").and_then(Value::as_object);
        if let Some(properties) = properties {
            for (name, subschema) in properties {
                if let Some(value) = object.get(name) {
                    self.check(root, subschema, value, &child_path(path, name), depth)?;
                }
            }
        }

        match keywords.get("additionalProperties") {
            None | Some(Value::Bool(true)) => {}
            Some(extra) => {
                for (name, value) in object {
                    if properties.is_some_and(|p| p.contains_key(name)) {
                        continue;
                    }
                    if extra == &Value::Bool(false) {
                        self.push(
                            &child_path(path, name),
                            "is not defined in the schema and the schema does not allow \
                             additional properties"
                                .to_string(),
                        );
                    } else {
                        self.check(root, extra, value, &child_path(path, name), depth)?;
                    }
                }
            }
        }
        Ok(())
    }

    fn check_array(
        &mut self,
        root: &'a Value,
        keywords: &'a Map<String, Value>,
        items: &[Value],
        path: &str,
        depth: usize,
    ) -> Result<()> {
        if let Some(min) = as_count(keywords, "minItems")
            && items.len() < min
        {
            self.push(
                path,
                format!("there must be a minimum of {min} items in the array"),
            );
        }
        if let Some(max) = as_count(keywords, "maxItems")
            && items.len() > max
        {
            self.push(
                path,
                format!("there must be a maximum of {max} items in the array"),
            );
        }
        match keywords.get("items") {
            Some(Value::Array(tuple)) => {
                for (index, (schema, item)) in tuple.iter().zip(items).enumerate() {
                    self.check(root, schema, item, &index_path(path, index), depth)?;
                }
            }
            Some(schema) => {
                for (index, item) in items.iter().enumerate() {
                    self.check(root, schema, item, &index_path(path, index), depth)?;
                }
            }
            None => {}
        }
        Ok(())
    }

    fn check_string(
        &mut self,
        keywords: &Map<String, Value>,
        text: &str,
        path: &str,
    ) -> Result<()> {
        let length = text.chars().count();
        if let Some(min) = as_count(keywords, "minLength")
            && length < min
        {
            self.push(path, format!("must be at least {min} characters long"));
        }
        if let Some(max) = as_count(keywords, "maxLength")
            && length > max
        {
            self.push(path, format!("may only be {max} characters long"));
        }
        if let Some(pattern) = keywords.get("pattern").and_then(Value::as_str) {
            if !self.patterns.contains_key(pattern) {
                let compiled = Regex::new(pattern).map_err(|e| ConfigError::ConfigLoad {
                    file: "schema".to_string(),
                    message: format!("invalid pattern '{pattern}': {e}"),
                })?;
                self.patterns.insert(pattern.to_string(), compiled);
            }
            let matched = self
                .patterns
                .get(pattern)
                .is_some_and(|regex| regex.is_match(text));
            if !matched {
                self.push(path, format!("does not match the regex pattern {pattern}"));
            }
        }
        Ok(())
    }

    fn check_number(&mut self, keywords: &Map<String, Value>, value: f64, path: &str) {
        if let Some(min) = as_limit(keywords, "minimum")
            && value < min
        {
            self.push(path, format!("must have a minimum value of {min}"));
        }
        if let Some(max) = as_limit(keywords, "maximum")
            && value > max
        {
            self.push(path, format!("must have a maximum value of {max}"));
        }
    }

    fn check_combinators(
        &mut self,
        root: &'a Value,
        keywords: &'a Map<String, Value>,
        instance: &Value,
        path: &str,
        depth: usize,
    ) -> Result<()> {
        if let Some(all) = keywords.get("allOf").and_then(Value::as_array) {
            for schema in all {
                self.check(root, schema, instance, path, depth)?;
            }
        }
        if let Some(any) = keywords.get("anyOf").and_then(Value::as_array) {
            let mut matched = false;
            for schema in any {
                if self.trial_run(root, schema, instance, path, depth)?.is_empty() {
                    matched = true;
                    break;
                }
            }
            if !matched {
                self.push(path, "should be valid to any of the schemas".to_string());
            }
        }
        if let Some(one) = keywords.get("oneOf").and_then(Value::as_array) {
            let mut valid = 0;
            for schema in one {
                if self.trial_run(root, schema, instance, path, depth)?.is_empty() {
                    valid += 1;
                }
            }
            if valid != 1 {
                self.push(
                    path,
                    format!("should be valid to one and only one schema, but {valid} are valid"),
                );
            }
        }
        if let Some(schema) = keywords.get("not")
            && self.trial_run(root, schema, instance, path, depth)?.is_empty()
        {
            self.push(path, "should not be valid to the schema".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> SchemaValidator {
        SchemaValidator::bundled().expect("bundled schemas parse")
    }

    #[test]
    fn bundled_defaults_are_valid() {
        let validator = validator();
        for (text, schema) in [
            (embedded::DEFAULT_CUE_CONFIG, "CueConfig.schema.json"),
            (embedded::DEFAULT_MEASUREMENT_CONF, "MeasurementConf.schema.json"),
            (embedded::DEFAULT_REFERENCE_CONF, "ReferenceConf.schema.json"),
        ] {
            validator
                .validate_text(text, schema, schema)
                .expect("default config validates");
        }
    }

    #[test]
    fn string_version_is_a_type_violation() {
        let document = json!({"format_version": "1", "configuration": []});
        let violations = validator()
            .violations(&document, "CueConfig.schema.json")
            .expect("schema resolves");
        assert_eq!(
            violations,
            vec![Violation {
                path: "$.format_version".to_string(),
                message: "string found, integer expected".to_string(),
            }]
        );
    }

    #[test]
    fn every_violation_is_reported() {
        let document = json!({
            "configuration": [
                {"cue": "", "measurements": []},
                {"cue": "Line Refs", "measurements": ["SNDF"], "colour": "red"}
            ]
        });
        let messages: Vec<String> = validator()
            .violations(&document, "CueConfig.schema.json")
            .expect("schema resolves")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            messages,
            vec![
                "$.format_version: is missing but it is required",
                "$.configuration[0].cue: must be at least 1 characters long",
                "$.configuration[0].measurements: there must be a minimum of 1 items in the array",
                "$.configuration[1].colour: is not defined in the schema and the schema does not \
                 allow additional properties",
            ]
        );
    }

    #[test]
    fn public_refs_resolve_to_bundled_copies() {
        let document = json!([{"target": "X", "function": "Length", "parameters": [true]}]);
        let messages: Vec<String> = validator()
            .violations(&document, "MeasurementConf.schema.json")
            .expect("schema resolves")
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            messages,
            vec![
                "$[0].function: does not match the regex pattern ^[a-z][a-z_]*$",
                "$[0].parameters[0]: boolean found, [string, number] expected",
            ]
        );
    }

    #[test]
    fn unknown_schema_is_an_error() {
        let err = validator()
            .validate(&json!({}), "Nope.schema.json")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSchema(name) if name == "Nope.schema.json"));
    }

    #[test]
    fn unmapped_public_ref_is_an_error() {
        let mut validator = validator();
        validator
            .insert_schema(
                "remote.schema.json",
                json!({"$ref": "https://example.org/elsewhere.schema.json"}),
            )
            .expect("supported keywords");
        let err = validator
            .violations(&json!({}), "remote.schema.json")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSchema(_)));
    }

    #[test]
    fn combinators() {
        let mut validator = validator();
        validator
            .insert_schema(
                "combo.schema.json",
                json!({
                    "anyOf": [{"type": "string"}, {"type": "integer"}],
                    "not": {"const": 3}
                }),
            )
            .expect("supported keywords");
        let check = |value: Value| {
            validator
                .violations(&value, "combo.schema.json")
                .expect("schema resolves")
                .len()
        };
        assert_eq!(check(json!("a")), 0);
        assert_eq!(check(json!(2)), 0);
        assert_eq!(check(json!(3)), 1);
        assert_eq!(check(json!(2.5)), 1);
    }

    #[test]
    fn integral_floats_are_integers() {
        let document = json!({"format_version": 1.0, "configuration": []});
        let violations = validator()
            .violations(&document, "CueConfig.schema.json")
            .expect("schema resolves");
        assert!(violations.is_empty(), "{violations:?}");
        assert!(!type_matches("integer", &json!(1.5)));
    }

    #[test]
    fn unsupported_keywords_are_rejected() {
        let mut validator = validator();
        let err = validator
            .insert_schema(
                "strict.schema.json",
                json!({
                    "type": "object",
                    "properties": {
                        "tags": {"type": "array", "uniqueItems": true},
                        "size": {"exclusiveMinimum": 0}
                    },
                    "if": {"required": ["tags"]}
                }),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to load configuration 'strict.schema.json': unsupported schema keyword(s): \
             $.if, $.properties.size.exclusiveMinimum, $.properties.tags.uniqueItems"
        );
        assert!(!validator.has_schema("strict.schema.json"));
    }
}
