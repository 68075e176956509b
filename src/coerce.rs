//! Coercion of matched raw strings into typed values.

use crate::grammar::Grammar;
use crate::matcher::ParseState;
use crate::schema::{FieldSpec, ScalarKind, SchemaNode, TypeShape};
use crate::value::{FieldPath, ResultTree, Value};
use std::num::IntErrorKind;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

/// A matched value that could not be converted to its declared type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{raw}' for {path}: {reason}")]
pub struct ValueError {
    pub path: FieldPath,
    pub raw: String,
    pub reason: String,
}

/// Convert one raw string to a scalar of the given kind.
pub fn coerce_scalar(kind: ScalarKind, raw: &str) -> Result<Value, String> {
    match kind {
        ScalarKind::String => Ok(Value::Str(raw.to_string())),
        ScalarKind::Path => Ok(Value::Path(PathBuf::from(raw))),
        ScalarKind::Int => raw.parse::<i64>().map(Value::Int).map_err(|e| {
            match e.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => "integer out of range",
                _ => "not an integer",
            }
            .to_string()
        }),
        ScalarKind::UInt => raw.parse::<u64>().map(Value::UInt).map_err(|e| {
            match e.kind() {
                IntErrorKind::PosOverflow => "integer out of range",
                _ => "not an unsigned integer",
            }
            .to_string()
        }),
        ScalarKind::Float => {
            let x: f64 = raw.parse().map_err(|_| "not a number".to_string())?;
            if x.is_finite() {
                Ok(Value::Float(x))
            } else {
                Err("not a finite number".to_string())
            }
        }
        ScalarKind::Bool => match raw.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" | "on" => Ok(Value::Bool(true)),
            "false" | "no" | "0" | "off" => Ok(Value::Bool(false)),
            _ => Err("not a boolean (expected true or false)".to_string()),
        },
    }
}

/// Check a raw string against a closed choice set.
pub fn coerce_choice(choices: &[String], raw: &str) -> Result<Value, String> {
    if choices.iter().any(|c| c == raw) {
        Ok(Value::Choice(raw.to_string()))
    } else {
        Err(format!(
            "invalid choice (expected one of: {})",
            choices.join(", ")
        ))
    }
}

/// Coerce a raw string for a scalar or enum shape.
pub fn coerce_leaf(shape: &TypeShape, raw: &str) -> Result<Value, String> {
    match shape {
        TypeShape::Scalar(kind) => coerce_scalar(*kind, raw),
        TypeShape::Enum(choices) => coerce_choice(choices, raw),
        other => Err(format!("{} is not a single-value type", other.describe())),
    }
}

/// Coerce every captured value in `state`, filling defaults for absent fields.
///
/// All errors across the tree are collected; the tree is returned only if
/// there were none. Required fields that were never supplied are skipped
/// here since matching already reported them.
pub fn validate(grammar: &Grammar, state: &ParseState) -> Result<ResultTree, Vec<ValueError>> {
    let mut validator = Validator {
        state,
        errors: Vec::new(),
    };
    let tree = validator.node(grammar.root(), &FieldPath::root());
    debug!(errors = validator.errors.len(), "coercion finished");

    if validator.errors.is_empty() {
        Ok(tree)
    } else {
        Err(validator.errors)
    }
}

struct Validator<'s> {
    state: &'s ParseState,
    errors: Vec<ValueError>,
}

impl Validator<'_> {
    fn node(&mut self, node: &SchemaNode, prefix: &FieldPath) -> ResultTree {
        let mut tree = ResultTree::new();
        for field in &node.fields {
            let path = prefix.child(&field.name);
            match &field.shape {
                TypeShape::Record(child) => {
                    tree.insert(field.name.clone(), Value::Record(self.node(child, &path)));
                }
                _ => {
                    if let Some(value) = self.field(field, &path) {
                        tree.insert(field.name.clone(), value);
                    }
                }
            }
        }
        tree
    }

    fn field(&mut self, field: &FieldSpec, path: &FieldPath) -> Option<Value> {
        let capture = match self.state.capture(path) {
            Some(capture) => capture,
            None => return field.default.clone(),
        };

        match &field.shape {
            TypeShape::Sequence { element, non_empty } => {
                if *non_empty && capture.values.is_empty() {
                    self.errors.push(ValueError {
                        path: path.clone(),
                        raw: String::new(),
                        reason: "expected at least one value".to_string(),
                    });
                    return None;
                }
                let mut items = Vec::with_capacity(capture.values.len());
                let mut failed = false;
                for raw in &capture.values {
                    match self.coerce(element, raw, path) {
                        Some(value) => items.push(value),
                        None => failed = true,
                    }
                }
                (!failed).then_some(Value::List(items))
            }
            TypeShape::Optional(inner) => {
                let raw = capture.values.last()?;
                self.coerce(inner, raw, path)
            }
            shape => {
                let raw = capture.values.last()?;
                self.coerce(shape, raw, path)
            }
        }
    }

    fn coerce(&mut self, shape: &TypeShape, raw: &str, path: &FieldPath) -> Option<Value> {
        match coerce_leaf(shape, raw) {
            Ok(value) => Some(value),
            Err(reason) => {
                self.errors.push(ValueError {
                    path: path.clone(),
                    raw: raw.to_string(),
                    reason,
                });
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaDocument;
    use crate::matcher::match_tokens;

    fn grammar(json: &str) -> Grammar {
        Grammar::compile(&SchemaDocument::from_json(json).unwrap()).unwrap()
    }

    fn run(grammar: &Grammar, tokens: &[&str]) -> Result<ResultTree, Vec<ValueError>> {
        let state = match_tokens(grammar, tokens);
        validate(grammar, &state)
    }

    #[test]
    fn test_coerce_int() {
        assert_eq!(coerce_scalar(ScalarKind::Int, "-42"), Ok(Value::Int(-42)));
        assert_eq!(
            coerce_scalar(ScalarKind::Int, "notanumber"),
            Err("not an integer".to_string())
        );
        assert_eq!(
            coerce_scalar(ScalarKind::Int, "99999999999999999999"),
            Err("integer out of range".to_string())
        );
    }

    #[test]
    fn test_coerce_uint() {
        assert_eq!(coerce_scalar(ScalarKind::UInt, "7"), Ok(Value::UInt(7)));
        assert_eq!(
            coerce_scalar(ScalarKind::UInt, "-7"),
            Err("not an unsigned integer".to_string())
        );
    }

    #[test]
    fn test_coerce_float() {
        assert_eq!(coerce_scalar(ScalarKind::Float, "2.5"), Ok(Value::Float(2.5)));
        assert_eq!(
            coerce_scalar(ScalarKind::Float, "abc"),
            Err("not a number".to_string())
        );
        assert_eq!(
            coerce_scalar(ScalarKind::Float, "inf"),
            Err("not a finite number".to_string())
        );
    }

    #[test]
    fn test_coerce_bool() {
        for raw in ["true", "YES", "1", "on"] {
            assert_eq!(coerce_scalar(ScalarKind::Bool, raw), Ok(Value::Bool(true)));
        }
        for raw in ["false", "No", "0", "off"] {
            assert_eq!(coerce_scalar(ScalarKind::Bool, raw), Ok(Value::Bool(false)));
        }
        assert!(coerce_scalar(ScalarKind::Bool, "maybe").is_err());
    }

    #[test]
    fn test_coerce_rejects_padded_numbers() {
        assert_eq!(
            coerce_scalar(ScalarKind::Int, " 80"),
            Err("not an integer".to_string())
        );
        assert_eq!(
            coerce_scalar(ScalarKind::UInt, "80 "),
            Err("not an unsigned integer".to_string())
        );
        assert_eq!(
            coerce_scalar(ScalarKind::Float, " 1.5"),
            Err("not a number".to_string())
        );
        assert!(coerce_scalar(ScalarKind::Bool, "true ").is_err());
    }

    #[test]
    fn test_coerce_string_and_path_keep_raw_text() {
        assert_eq!(
            coerce_scalar(ScalarKind::String, " spaced "),
            Ok(Value::Str(" spaced ".to_string()))
        );
        assert_eq!(
            coerce_scalar(ScalarKind::Path, "/tmp/x"),
            Ok(Value::Path(PathBuf::from("/tmp/x")))
        );
    }

    #[test]
    fn test_coerce_choice() {
        let choices = vec!["json".to_string(), "yaml".to_string()];
        assert_eq!(
            coerce_choice(&choices, "json"),
            Ok(Value::Choice("json".to_string()))
        );
        assert_eq!(
            coerce_choice(&choices, "toml"),
            Err("invalid choice (expected one of: json, yaml)".to_string())
        );
    }

    #[test]
    fn test_validate_fills_defaults() {
        let g = grammar(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "host", "type": "str", "default": "localhost"},
                {"name": "name", "type": "optional<str>"},
                {"name": "files", "type": "list<path>"},
                {"name": "verbose", "type": "bool"}
            ]}]}"#,
        );
        let tree = run(&g, &[]).unwrap();
        assert_eq!(tree.get("host"), Some(&Value::Str("localhost".to_string())));
        assert_eq!(tree.get("name"), Some(&Value::Absent));
        assert_eq!(tree.get("files"), Some(&Value::List(vec![])));
        assert_eq!(tree.get("verbose"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_validate_sequence_preserves_order() {
        let g = grammar(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "ports", "type": "list<int>"}
            ]}]}"#,
        );
        let tree = run(&g, &["--ports", "3", "1", "2"]).unwrap();
        assert_eq!(
            tree.get("ports"),
            Some(&Value::List(vec![Value::Int(3), Value::Int(1), Value::Int(2)]))
        );
    }

    #[test]
    fn test_validate_collects_every_error() {
        let g = grammar(
            r#"{"records": [
                {"name": "Args", "fields": [
                    {"name": "count", "type": "int"},
                    {"name": "ports", "type": "list<int>"},
                    {"name": "mode", "type": "enum", "choices": ["a", "b"]},
                    {"name": "server", "type": "Server"}
                ]},
                {"name": "Server", "fields": [{"name": "port", "type": "uint"}]}
            ]}"#,
        );
        let errors = run(
            &g,
            &[
                "--count",
                "x",
                "--ports",
                "1",
                "y",
                "z",
                "--mode",
                "c",
                "--server-port",
                "-1",
            ],
        )
        .unwrap_err();

        let paths: Vec<String> = errors.iter().map(|e| e.path.to_string()).collect();
        assert_eq!(
            paths,
            vec!["count", "ports", "ports", "mode", "server.port"]
        );
        assert_eq!(errors[1].raw, "y");
        assert_eq!(errors[2].raw, "z");
    }

    #[test]
    fn test_validate_nested_error_path() {
        let g = grammar(
            r#"{"records": [
                {"name": "Args", "fields": [{"name": "server", "type": "Server"}]},
                {"name": "Server", "fields": [
                    {"name": "host", "type": "str"},
                    {"name": "port", "type": "int"}
                ]}
            ]}"#,
        );
        let errors = run(&g, &["--server-host", "x", "--server-port", "notanumber"]).unwrap_err();
        assert_eq!(
            errors,
            vec![ValueError {
                path: FieldPath::from("server.port"),
                raw: "notanumber".to_string(),
                reason: "not an integer".to_string(),
            }]
        );
    }

    #[test]
    fn test_validate_skips_missing_required() {
        let g = grammar(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "port", "type": "int"}
            ]}]}"#,
        );
        let tree = run(&g, &[]).unwrap();
        assert!(tree.get("port").is_none());
    }
}
