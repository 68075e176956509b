//! Schema introspection: record definitions into a normalized schema tree.
//!
//! Every field is classified into a [`TypeShape`] exactly once here; later
//! stages match on the shape instead of re-reading type expressions.

use crate::coerce::coerce_leaf;
use crate::config::{FieldDef, RecordDef, SchemaDocument, SequenceStyle};
use crate::value::{FieldPath, Value};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::debug;

/// Deepest record nesting accepted before introspection gives up.
pub const MAX_NESTING_DEPTH: usize = 32;

/// Errors in a record-type definition, raised while building the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("schema defines no record types")]
    NoRecords,

    #[error("root record '{0}' is not defined")]
    UnknownRoot(String),

    #[error("duplicate type name: {0}")]
    DuplicateTypeName(String),

    #[error("duplicate field name: {0}")]
    DuplicateField(FieldPath),

    #[error("unsupported type '{type_name}' for field {field}")]
    UnsupportedType { field: FieldPath, type_name: String },

    #[error("record type nests itself: {0}")]
    RecordCycle(String),

    #[error("records nested deeper than {max} levels at {field}")]
    NestingTooDeep { field: FieldPath, max: usize },

    #[error("invalid default for {field}: {reason}")]
    InvalidDefault { field: FieldPath, reason: String },

    #[error("'choices' on {0} is empty: must have at least one valid value")]
    EmptyChoices(FieldPath),

    #[error("'choices' on {0} has duplicate value: {1}")]
    DuplicateChoice(FieldPath, String),

    #[error("invalid short option '{short}' on {field}: must be a single ASCII letter")]
    InvalidShortOption { field: FieldPath, short: char },

    #[error("invalid long option '{long}' on {field}")]
    InvalidLongOption { field: FieldPath, long: String },

    #[error("record '{0}' declares more than one positional field")]
    MultiplePositionals(String),

    #[error("positional {field} cannot follow variadic positional {variadic}")]
    PositionalAfterVariadic {
        field: FieldPath,
        variadic: FieldPath,
    },

    #[error("required positional {field} cannot follow optional positional {optional}")]
    RequiredAfterOptional {
        field: FieldPath,
        optional: FieldPath,
    },

    #[error("flag {flag} of {second} collides with {first}")]
    FlagCollision {
        flag: String,
        first: String,
        second: String,
    },

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: FieldPath, reason: String },
}

/// Built-in scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    String,
    Int,
    UInt,
    Float,
    Bool,
    Path,
}

impl ScalarKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" | "str" => Some(ScalarKind::String),
            "int" | "i64" => Some(ScalarKind::Int),
            "uint" | "u64" => Some(ScalarKind::UInt),
            "float" | "f64" => Some(ScalarKind::Float),
            "bool" => Some(ScalarKind::Bool),
            "path" => Some(ScalarKind::Path),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ScalarKind::String => "string",
            ScalarKind::Int => "int",
            ScalarKind::UInt => "uint",
            ScalarKind::Float => "float",
            ScalarKind::Bool => "bool",
            ScalarKind::Path => "path",
        }
    }
}

/// Classified shape of a field's declared type.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeShape {
    Scalar(ScalarKind),
    Enum(Vec<String>),
    /// Wraps a scalar or enum; absence is a valid value.
    Optional(Box<TypeShape>),
    /// Wraps a scalar or enum.
    Sequence {
        element: Box<TypeShape>,
        non_empty: bool,
    },
    Record(SchemaNode),
}

impl TypeShape {
    /// The scalar or enum shape inside any optional/sequence wrapper.
    pub fn leaf(&self) -> &TypeShape {
        match self {
            TypeShape::Optional(inner) => inner.leaf(),
            TypeShape::Sequence { element, .. } => element.leaf(),
            shape => shape,
        }
    }

    /// Plain bool fields are matched as switches.
    pub fn is_switch(&self) -> bool {
        matches!(self, TypeShape::Scalar(ScalarKind::Bool))
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, TypeShape::Sequence { .. })
    }

    pub fn choices(&self) -> Option<&[String]> {
        match self.leaf() {
            TypeShape::Enum(choices) => Some(choices),
            _ => None,
        }
    }

    /// Type expression describing this shape, for metadata output.
    pub fn describe(&self) -> String {
        match self {
            TypeShape::Scalar(kind) => kind.name().to_string(),
            TypeShape::Enum(_) => "enum".to_string(),
            TypeShape::Optional(inner) => format!("optional<{}>", inner.describe()),
            TypeShape::Sequence {
                element,
                non_empty: true,
            } => format!("nonempty<{}>", element.describe()),
            TypeShape::Sequence { element, .. } => format!("list<{}>", element.describe()),
            TypeShape::Record(node) => node.type_name.clone(),
        }
    }
}

/// How many values a field takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Arity {
    ExactlyOne,
    ZeroOrOne,
    ZeroOrMore,
    OneOrMore,
}

impl Arity {
    pub fn allows_zero(&self) -> bool {
        matches!(self, Arity::ZeroOrOne | Arity::ZeroOrMore)
    }
}

/// A normalized field declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub shape: TypeShape,
    /// Typed default; `None` means the field must be supplied (or is a record)
    pub default: Option<Value>,
    pub required: bool,
    pub arity: Arity,
    pub short: Option<char>,
    /// Long spelling before any nesting prefix; `None` for positionals
    pub long: Option<String>,
    pub aliases: Vec<String>,
    pub help: Option<String>,
    pub metavar: Option<String>,
    pub positional: bool,
    pub sequence_style: SequenceStyle,
    pub delimiter: Option<char>,
    pub negatable: bool,
    pub flatten: bool,
}

/// A record type's fields; record-typed fields own their child node.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub type_name: String,
    pub title: Option<String>,
    pub help: Option<String>,
    pub fields: Vec<FieldSpec>,
}

impl SchemaNode {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Number of non-record fields in this node and all nested nodes.
    pub fn leaf_count(&self) -> usize {
        self.fields
            .iter()
            .map(|f| match &f.shape {
                TypeShape::Record(child) => child.leaf_count(),
                _ => 1,
            })
            .sum()
    }
}

/// Build the schema tree for a document's root record.
pub fn introspect(doc: &SchemaDocument) -> Result<SchemaNode, SchemaError> {
    let registry = TypeRegistry::new(doc)?;
    let root_name = doc.root_name().ok_or(SchemaError::NoRecords)?;
    let root = registry
        .records
        .get(root_name)
        .copied()
        .ok_or_else(|| SchemaError::UnknownRoot(root_name.to_string()))?;

    let mut introspector = Introspector {
        registry: &registry,
        default_style: doc.settings.sequence_style,
        visiting: Vec::new(),
    };
    let node = introspector.record(root, &FieldPath::root())?;
    debug!(
        root = root_name,
        fields = node.leaf_count(),
        "introspected schema"
    );
    Ok(node)
}

/// Named record and enum types of one document.
struct TypeRegistry<'a> {
    records: HashMap<&'a str, &'a RecordDef>,
    enums: HashMap<&'a str, &'a [String]>,
}

impl<'a> TypeRegistry<'a> {
    fn new(doc: &'a SchemaDocument) -> Result<Self, SchemaError> {
        let mut seen = HashSet::new();
        let names = doc
            .records
            .iter()
            .map(|r| r.name.as_str())
            .chain(doc.enums.iter().map(|e| e.name.as_str()));
        for name in names {
            let builtin = ScalarKind::from_name(name).is_some() || name == "enum";
            if builtin || !seen.insert(name) {
                return Err(SchemaError::DuplicateTypeName(name.to_string()));
            }
        }

        Ok(Self {
            records: doc.records.iter().map(|r| (r.name.as_str(), r)).collect(),
            enums: doc
                .enums
                .iter()
                .map(|e| (e.name.as_str(), e.choices.as_slice()))
                .collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wrapper {
    Plain,
    Optional,
    List,
    NonEmpty,
}

/// Split a type expression into its wrapper and the wrapped type name.
///
/// Returns `None` for anything that isn't a name or a single wrapper around
/// a name, e.g. `list<optional<int>>`.
fn parse_type_expr(expr: &str) -> Option<(Wrapper, &str)> {
    let expr = expr.trim();
    let wrappers = [
        ("optional<", Wrapper::Optional),
        ("list<", Wrapper::List),
        ("nonempty<", Wrapper::NonEmpty),
    ];
    for (prefix, wrapper) in wrappers {
        if let Some(rest) = expr.strip_prefix(prefix) {
            let inner = rest.strip_suffix('>')?.trim();
            return is_type_name(inner).then_some((wrapper, inner));
        }
    }
    is_type_name(expr).then_some((Wrapper::Plain, expr))
}

fn is_type_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_valid_long(long: &str) -> bool {
    !long.is_empty()
        && !long.starts_with('-')
        && long
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Long spelling derived from a field name.
pub(crate) fn kebab(name: &str) -> String {
    name.replace('_', "-")
}

struct Introspector<'a> {
    registry: &'a TypeRegistry<'a>,
    default_style: SequenceStyle,
    /// Records currently being expanded, outermost first
    visiting: Vec<&'a str>,
}

impl<'a> Introspector<'a> {
    fn record(&mut self, def: &'a RecordDef, prefix: &FieldPath) -> Result<SchemaNode, SchemaError> {
        if let Some(start) = self.visiting.iter().position(|n| *n == def.name) {
            let mut chain = self.visiting[start..].to_vec();
            chain.push(&def.name);
            return Err(SchemaError::RecordCycle(chain.join(" -> ")));
        }
        if self.visiting.len() >= MAX_NESTING_DEPTH {
            return Err(SchemaError::NestingTooDeep {
                field: prefix.clone(),
                max: MAX_NESTING_DEPTH,
            });
        }

        self.visiting.push(&def.name);
        let mut names = HashSet::new();
        let mut has_positional = false;
        let mut fields = Vec::with_capacity(def.fields.len());

        for field in &def.fields {
            let path = prefix.child(&field.name);
            if field.name.trim().is_empty() {
                return Err(invalid(&path, "field name is empty"));
            }
            if !names.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField(path));
            }
            if field.positional {
                if has_positional {
                    return Err(SchemaError::MultiplePositionals(def.name.clone()));
                }
                has_positional = true;
            }
            fields.push(self.field(field, &path)?);
        }
        self.visiting.pop();

        Ok(SchemaNode {
            type_name: def.name.clone(),
            title: def.title.clone(),
            help: def.help.clone(),
            fields,
        })
    }

    fn field(&mut self, def: &'a FieldDef, path: &FieldPath) -> Result<FieldSpec, SchemaError> {
        let shape = self.shape(def, path)?;
        check_placement(def, &shape, path)?;
        let long = check_spellings(def, path)?;

        let declared = match &def.default {
            Some(json) => Some(default_value(json, &shape).map_err(|reason| {
                SchemaError::InvalidDefault {
                    field: path.clone(),
                    reason,
                }
            })?),
            None => None,
        };

        let (default, required, arity) = match &shape {
            TypeShape::Scalar(ScalarKind::Bool) => (
                Some(declared.unwrap_or(Value::Bool(false))),
                false,
                Arity::ZeroOrOne,
            ),
            TypeShape::Scalar(_) | TypeShape::Enum(_) => match declared {
                Some(value) => (Some(value), false, Arity::ZeroOrOne),
                None => (None, true, Arity::ExactlyOne),
            },
            TypeShape::Optional(_) => (
                Some(declared.unwrap_or(Value::Absent)),
                false,
                Arity::ZeroOrOne,
            ),
            TypeShape::Sequence {
                non_empty: false, ..
            } => (
                Some(declared.unwrap_or(Value::List(Vec::new()))),
                false,
                Arity::ZeroOrMore,
            ),
            TypeShape::Sequence {
                non_empty: true, ..
            } => {
                let required = declared.is_none();
                (declared, required, Arity::OneOrMore)
            }
            TypeShape::Record(_) => (None, false, Arity::ExactlyOne),
        };

        // A switch that is on by default can only be turned off by a second flag.
        let negatable = def.negatable || default == Some(Value::Bool(true));

        Ok(FieldSpec {
            name: def.name.clone(),
            shape,
            default,
            required,
            arity,
            short: def.short,
            long,
            aliases: def.aliases.clone(),
            help: def.help.clone(),
            metavar: def.metavar.clone(),
            positional: def.positional,
            sequence_style: def.sequence.unwrap_or(self.default_style),
            delimiter: def.delimiter,
            negatable,
            flatten: def.flatten,
        })
    }

    fn shape(&mut self, def: &'a FieldDef, path: &FieldPath) -> Result<TypeShape, SchemaError> {
        let unsupported = || SchemaError::UnsupportedType {
            field: path.clone(),
            type_name: def.type_name.clone(),
        };
        let (wrapper, name) = parse_type_expr(&def.type_name).ok_or_else(unsupported)?;

        let leaf = match self.value_shape(def, name, path)? {
            Some(leaf) => leaf,
            None => {
                // Records can't sit inside optional/sequence wrappers.
                let record = match (wrapper, self.registry.records.get(name)) {
                    (Wrapper::Plain, Some(record)) => *record,
                    _ => return Err(unsupported()),
                };
                return Ok(TypeShape::Record(self.record(record, path)?));
            }
        };

        if def.choices.is_some() && name != "enum" {
            return Err(invalid(path, "'choices' requires type 'enum'"));
        }

        Ok(match wrapper {
            Wrapper::Plain => leaf,
            Wrapper::Optional => TypeShape::Optional(Box::new(leaf)),
            Wrapper::List => TypeShape::Sequence {
                element: Box::new(leaf),
                non_empty: false,
            },
            Wrapper::NonEmpty => TypeShape::Sequence {
                element: Box::new(leaf),
                non_empty: true,
            },
        })
    }

    /// Resolve a scalar or enum type name; `Ok(None)` if it names neither.
    fn value_shape(
        &self,
        def: &FieldDef,
        name: &str,
        path: &FieldPath,
    ) -> Result<Option<TypeShape>, SchemaError> {
        if let Some(kind) = ScalarKind::from_name(name) {
            return Ok(Some(TypeShape::Scalar(kind)));
        }
        let choices = if name == "enum" {
            def.choices
                .as_deref()
                .ok_or_else(|| invalid(path, "type 'enum' requires 'choices'"))?
        } else {
            match self.registry.enums.get(name) {
                Some(choices) => *choices,
                None => return Ok(None),
            }
        };
        validate_choices(choices, path)?;
        Ok(Some(TypeShape::Enum(choices.to_vec())))
    }
}

fn invalid(path: &FieldPath, reason: &str) -> SchemaError {
    SchemaError::InvalidField {
        field: path.clone(),
        reason: reason.to_string(),
    }
}

fn validate_choices(choices: &[String], path: &FieldPath) -> Result<(), SchemaError> {
    if choices.is_empty() {
        return Err(SchemaError::EmptyChoices(path.clone()));
    }
    let mut seen = HashSet::new();
    for choice in choices {
        if !seen.insert(choice) {
            return Err(SchemaError::DuplicateChoice(path.clone(), choice.clone()));
        }
    }
    Ok(())
}

/// Reject options that make no sense for the field's shape.
fn check_placement(def: &FieldDef, shape: &TypeShape, path: &FieldPath) -> Result<(), SchemaError> {
    if let TypeShape::Record(_) = shape {
        let misplaced = [
            ("default", def.default.is_some()),
            ("short", def.short.is_some()),
            ("aliases", !def.aliases.is_empty()),
            ("metavar", def.metavar.is_some()),
            ("positional", def.positional),
            ("sequence", def.sequence.is_some()),
            ("delimiter", def.delimiter.is_some()),
            ("negatable", def.negatable),
        ];
        if let Some((option, _)) = misplaced.iter().find(|(_, set)| *set) {
            return Err(invalid(
                path,
                &format!("'{}' is not allowed on a record field", option),
            ));
        }
        if def.flatten && def.long.is_some() {
            return Err(invalid(path, "'long' cannot be combined with 'flatten'"));
        }
        return Ok(());
    }

    if def.flatten {
        return Err(invalid(path, "'flatten' requires a record type"));
    }
    if !shape.is_sequence() && (def.sequence.is_some() || def.delimiter.is_some()) {
        return Err(invalid(
            path,
            "'sequence' and 'delimiter' require a list or nonempty type",
        ));
    }
    if def.negatable && !shape.is_switch() {
        return Err(invalid(path, "'negatable' requires type 'bool'"));
    }
    if def.positional {
        if shape.is_switch() {
            return Err(invalid(path, "bool fields cannot be positional"));
        }
        if def.short.is_some() || def.long.is_some() || !def.aliases.is_empty() {
            return Err(invalid(
                path,
                "positional fields cannot declare flag spellings",
            ));
        }
    }
    Ok(())
}

/// Validate spellings and return the field's unprefixed long name.
fn check_spellings(def: &FieldDef, path: &FieldPath) -> Result<Option<String>, SchemaError> {
    if let Some(short) = def.short {
        if !short.is_ascii_alphabetic() {
            return Err(SchemaError::InvalidShortOption {
                field: path.clone(),
                short,
            });
        }
    }
    for alias in &def.aliases {
        if !is_valid_long(alias) {
            return Err(SchemaError::InvalidLongOption {
                field: path.clone(),
                long: alias.clone(),
            });
        }
    }
    if def.positional || def.flatten {
        return Ok(None);
    }

    let long = def.long.clone().unwrap_or_else(|| kebab(&def.name));
    if !is_valid_long(&long) {
        return Err(SchemaError::InvalidLongOption {
            field: path.clone(),
            long,
        });
    }
    Ok(Some(long))
}

/// Convert a JSON default into a typed value for `shape`.
fn default_value(json: &serde_json::Value, shape: &TypeShape) -> Result<Value, String> {
    use serde_json::Value as Json;

    match shape {
        TypeShape::Optional(inner) => match json {
            Json::Null => Ok(Value::Absent),
            other => default_value(other, inner),
        },
        TypeShape::Sequence { element, non_empty } => {
            let items = json.as_array().ok_or("expected an array")?;
            if *non_empty && items.is_empty() {
                return Err("expected at least one value".to_string());
            }
            items
                .iter()
                .map(|item| default_value(item, element))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::List)
        }
        TypeShape::Record(_) => Err("record fields cannot have defaults".to_string()),
        TypeShape::Scalar(_) | TypeShape::Enum(_) => match json {
            Json::String(s) => coerce_leaf(shape, s),
            Json::Bool(b) => coerce_leaf(shape, &b.to_string()),
            Json::Number(n) => coerce_leaf(shape, &n.to_string()),
            Json::Null => Err("null is only allowed for optional fields".to_string()),
            _ => Err("expected a single value".to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaDocument;

    fn doc(json: &str) -> SchemaDocument {
        SchemaDocument::from_json(json).unwrap()
    }

    fn root(json: &str) -> SchemaNode {
        introspect(&doc(json)).unwrap()
    }

    fn error(json: &str) -> SchemaError {
        introspect(&doc(json)).unwrap_err()
    }

    #[test]
    fn test_classifies_shapes() {
        let node = root(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "port", "type": "int"},
                {"name": "name", "type": "optional<string>"},
                {"name": "files", "type": "list<path>"},
                {"name": "tags", "type": "nonempty<str>"},
                {"name": "mode", "type": "enum", "choices": ["fast", "slow"]},
                {"name": "level", "type": "Level", "default": "info"}
            ]}], "enums": [{"name": "Level", "choices": ["debug", "info"]}]}"#,
        );

        let shapes: Vec<String> = node.fields.iter().map(|f| f.shape.describe()).collect();
        assert_eq!(
            shapes,
            vec![
                "int",
                "optional<string>",
                "list<path>",
                "nonempty<string>",
                "enum",
                "enum"
            ]
        );
        assert_eq!(
            node.field("level").unwrap().shape.choices(),
            Some(&["debug".to_string(), "info".to_string()][..])
        );
    }

    #[test]
    fn test_required_and_arity_rules() {
        let node = root(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "host", "type": "string", "default": "localhost"},
                {"name": "port", "type": "int"},
                {"name": "verbose", "type": "bool"},
                {"name": "name", "type": "optional<string>"},
                {"name": "files", "type": "list<path>"},
                {"name": "tags", "type": "nonempty<str>"}
            ]}]}"#,
        );

        let host = node.field("host").unwrap();
        assert!(!host.required);
        assert_eq!(host.arity, Arity::ZeroOrOne);
        assert_eq!(host.default, Some(Value::Str("localhost".to_string())));

        let port = node.field("port").unwrap();
        assert!(port.required);
        assert_eq!(port.arity, Arity::ExactlyOne);
        assert_eq!(port.default, None);

        let verbose = node.field("verbose").unwrap();
        assert!(!verbose.required);
        assert_eq!(verbose.default, Some(Value::Bool(false)));
        assert!(!verbose.negatable);

        let name = node.field("name").unwrap();
        assert!(!name.required);
        assert_eq!(name.default, Some(Value::Absent));

        let files = node.field("files").unwrap();
        assert_eq!(files.arity, Arity::ZeroOrMore);
        assert_eq!(files.default, Some(Value::List(vec![])));

        let tags = node.field("tags").unwrap();
        assert_eq!(tags.arity, Arity::OneOrMore);
        assert!(tags.required);
    }

    #[test]
    fn test_field_with_default_is_never_required() {
        let node = root(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "tags", "type": "nonempty<str>", "default": ["a"]},
                {"name": "port", "type": "int", "default": 1}
            ]}]}"#,
        );
        assert!(node.fields.iter().all(|f| !f.required));
    }

    #[test]
    fn test_true_default_makes_bool_negatable() {
        let node = root(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "color", "type": "bool", "default": true}
            ]}]}"#,
        );
        assert!(node.field("color").unwrap().negatable);
    }

    #[test]
    fn test_long_derived_from_name() {
        let node = root(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "dry_run", "type": "bool"},
                {"name": "out", "type": "path", "long": "output"},
                {"name": "input", "type": "path", "positional": true}
            ]}]}"#,
        );
        assert_eq!(node.fields[0].long.as_deref(), Some("dry-run"));
        assert_eq!(node.fields[1].long.as_deref(), Some("output"));
        assert_eq!(node.fields[2].long, None);
    }

    #[test]
    fn test_nested_records() {
        let node = root(
            r#"{"records": [
                {"name": "Args", "fields": [{"name": "server", "type": "Server"}]},
                {"name": "Server", "fields": [
                    {"name": "host", "type": "string"},
                    {"name": "port", "type": "int"}
                ]}
            ]}"#,
        );
        let server = node.field("server").unwrap();
        match &server.shape {
            TypeShape::Record(child) => {
                assert_eq!(child.type_name, "Server");
                assert_eq!(child.fields.len(), 2);
            }
            other => panic!("Expected record, got {:?}", other),
        }
        assert_eq!(node.leaf_count(), 2);
    }

    #[test]
    fn test_introspection_is_deterministic() {
        let json = r#"{"records": [
            {"name": "Args", "fields": [{"name": "a", "type": "int"}, {"name": "s", "type": "S"}]},
            {"name": "S", "fields": [{"name": "b", "type": "list<int>", "default": [1, 2]}]}
        ]}"#;
        assert_eq!(root(json), root(json));
    }

    #[test]
    fn test_error_on_unsupported_types() {
        for type_name in ["complex", "list<optional<int>>", "optional<Server>", "list<>", ""] {
            let json = format!(
                r#"{{"records": [
                    {{"name": "Args", "fields": [{{"name": "x", "type": "{}"}}]}},
                    {{"name": "Server", "fields": []}}
                ]}}"#,
                type_name
            );
            assert!(
                matches!(error(&json), SchemaError::UnsupportedType { .. }),
                "Expected '{}' to be unsupported",
                type_name
            );
        }
    }

    #[test]
    fn test_error_on_direct_cycle() {
        let err = error(
            r#"{"records": [{"name": "Node", "fields": [{"name": "next", "type": "Node"}]}]}"#,
        );
        assert_eq!(err, SchemaError::RecordCycle("Node -> Node".to_string()));
    }

    #[test]
    fn test_error_on_transitive_cycle() {
        let err = error(
            r#"{"records": [
                {"name": "Args", "fields": [{"name": "a", "type": "A"}]},
                {"name": "A", "fields": [{"name": "b", "type": "B"}]},
                {"name": "B", "fields": [{"name": "a", "type": "A"}]}
            ]}"#,
        );
        assert_eq!(err, SchemaError::RecordCycle("A -> B -> A".to_string()));
    }

    #[test]
    fn test_same_record_used_twice_is_not_a_cycle() {
        let node = root(
            r#"{"records": [
                {"name": "Args", "fields": [
                    {"name": "primary", "type": "Endpoint"},
                    {"name": "backup", "type": "Endpoint"}
                ]},
                {"name": "Endpoint", "fields": [{"name": "port", "type": "int"}]}
            ]}"#,
        );
        assert_eq!(node.leaf_count(), 2);
    }

    #[test]
    fn test_error_on_duplicate_field() {
        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "x", "type": "int"}, {"name": "x", "type": "str"}
            ]}]}"#,
        );
        assert_eq!(err, SchemaError::DuplicateField(FieldPath::from("x")));
    }

    #[test]
    fn test_error_on_duplicate_type_name() {
        let err = error(
            r#"{"records": [{"name": "Args"}], "enums": [{"name": "Args", "choices": ["a"]}]}"#,
        );
        assert_eq!(err, SchemaError::DuplicateTypeName("Args".to_string()));

        let err = error(r#"{"records": [{"name": "int"}]}"#);
        assert_eq!(err, SchemaError::DuplicateTypeName("int".to_string()));
    }

    #[test]
    fn test_error_on_missing_root() {
        assert_eq!(error(r#"{"records": []}"#), SchemaError::NoRecords);
        assert_eq!(
            error(r#"{"root": "Main", "records": [{"name": "Args"}]}"#),
            SchemaError::UnknownRoot("Main".to_string())
        );
    }

    #[test]
    fn test_error_on_invalid_default() {
        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "port", "type": "int", "default": "eighty"}
            ]}]}"#,
        );
        assert!(matches!(err, SchemaError::InvalidDefault { field, .. } if field.to_string() == "port"));

        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "mode", "type": "enum", "choices": ["a", "b"], "default": "c"}
            ]}]}"#,
        );
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));

        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "tags", "type": "nonempty<str>", "default": []}
            ]}]}"#,
        );
        assert!(matches!(err, SchemaError::InvalidDefault { .. }));
    }

    #[test]
    fn test_typed_defaults() {
        let node = root(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "ratio", "type": "float", "default": 0.5},
                {"name": "count", "type": "uint", "default": "3"},
                {"name": "name", "type": "optional<str>", "default": null},
                {"name": "ports", "type": "list<int>", "default": [80, 443]}
            ]}]}"#,
        );
        assert_eq!(node.fields[0].default, Some(Value::Float(0.5)));
        assert_eq!(node.fields[1].default, Some(Value::UInt(3)));
        assert_eq!(node.fields[2].default, Some(Value::Absent));
        assert_eq!(
            node.fields[3].default,
            Some(Value::List(vec![Value::Int(80), Value::Int(443)]))
        );
    }

    #[test]
    fn test_error_on_bad_choices() {
        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "mode", "type": "enum", "choices": []}
            ]}]}"#,
        );
        assert_eq!(err, SchemaError::EmptyChoices(FieldPath::from("mode")));

        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "mode", "type": "enum", "choices": ["a", "a"]}
            ]}]}"#,
        );
        assert!(matches!(err, SchemaError::DuplicateChoice(_, v) if v == "a"));

        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "mode", "type": "str", "choices": ["a"]}
            ]}]}"#,
        );
        assert!(matches!(err, SchemaError::InvalidField { .. }));
    }

    #[test]
    fn test_error_on_invalid_spellings() {
        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "x", "type": "bool", "short": "1"}
            ]}]}"#,
        );
        assert!(matches!(err, SchemaError::InvalidShortOption { short: '1', .. }));

        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "x", "type": "bool", "long": "--x"}
            ]}]}"#,
        );
        assert!(matches!(err, SchemaError::InvalidLongOption { .. }));

        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "bad name", "type": "bool"}
            ]}]}"#,
        );
        assert!(matches!(err, SchemaError::InvalidLongOption { .. }));
    }

    #[test]
    fn test_error_on_multiple_positionals_in_one_record() {
        let err = error(
            r#"{"records": [{"name": "Args", "fields": [
                {"name": "a", "type": "str", "positional": true},
                {"name": "b", "type": "str", "positional": true}
            ]}]}"#,
        );
        assert_eq!(err, SchemaError::MultiplePositionals("Args".to_string()));
    }

    #[test]
    fn test_error_on_misplaced_options() {
        let cases = [
            r#"{"name": "v", "type": "bool", "positional": true}"#,
            r#"{"name": "p", "type": "int", "positional": true, "short": "p"}"#,
            r#"{"name": "n", "type": "int", "negatable": true}"#,
            r#"{"name": "n", "type": "int", "delimiter": ","}"#,
            r#"{"name": "n", "type": "int", "flatten": true}"#,
            r#"{"name": "s", "type": "Sub", "short": "s"}"#,
            r#"{"name": "s", "type": "Sub", "default": 1}"#,
        ];
        for field in cases {
            let json = format!(
                r#"{{"records": [
                    {{"name": "Args", "fields": [{}]}},
                    {{"name": "Sub", "fields": []}}
                ]}}"#,
                field
            );
            assert!(
                matches!(error(&json), SchemaError::InvalidField { .. }),
                "Expected {} to be rejected",
                field
            );
        }
    }

    #[test]
    fn test_error_on_excessive_nesting() {
        let mut records = Vec::new();
        for i in 0..=MAX_NESTING_DEPTH {
            records.push(format!(
                r#"{{"name": "R{}", "fields": [{{"name": "next", "type": "R{}"}}]}}"#,
                i,
                i + 1
            ));
        }
        records.push(format!(
            r#"{{"name": "R{}", "fields": []}}"#,
            MAX_NESTING_DEPTH + 1
        ));
        let json = format!(r#"{{"records": [{}]}}"#, records.join(","));
        assert!(matches!(error(&json), SchemaError::NestingTooDeep { .. }));
    }

    #[test]
    fn test_parse_type_expr() {
        assert_eq!(parse_type_expr("int"), Some((Wrapper::Plain, "int")));
        assert_eq!(
            parse_type_expr(" optional< path > "),
            Some((Wrapper::Optional, "path"))
        );
        assert_eq!(parse_type_expr("list<Level>"), Some((Wrapper::List, "Level")));
        assert_eq!(parse_type_expr("nonempty<int"), None);
        assert_eq!(parse_type_expr("map<int>"), None);
    }
}
