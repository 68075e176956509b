//! Field paths, typed values and the per-call result tree.

use serde::{Serialize, Serializer};
use std::fmt;
use std::path::PathBuf;

/// Sequence of field names from the root record down to a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    /// The empty path naming the root record itself.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Extend this path by one field name.
    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(name.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// The last segment, i.e. the field's own name.
    pub fn leaf(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        if dotted.is_empty() {
            return Self::root();
        }
        Self(dotted.split('.').map(str::to_string).collect())
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl Serialize for FieldPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A coerced, typed value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Explicitly absent (an omitted optional field).
    Absent,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Path(PathBuf),
    /// A member of an enum's choice set.
    Choice(String),
    List(Vec<Value>),
    Record(ResultTree),
}

impl Value {
    pub fn is_absent(&self) -> bool {
        matches!(self, Value::Absent)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) | Value::Choice(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&ResultTree> {
        match self {
            Value::Record(tree) => Some(tree),
            _ => None,
        }
    }
}

/// Renders scalars the way they would be typed on a command line.
///
/// Lists render comma-separated and records render as `{..}`; neither form
/// is meant to be parsed back.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Absent => Ok(()),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::UInt(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) | Value::Choice(s) => f.write_str(s),
            Value::Path(p) => write!(f, "{}", p.display()),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
            Value::Record(_) => f.write_str("{..}"),
        }
    }
}

/// Ordered mapping from field name to coerced value for one record level.
///
/// Entries keep the record's declaration order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultTree {
    entries: Vec<(String, Value)>,
}

impl ResultTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the value for `name`.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Look up a value by its full path through nested records.
    pub fn get_path(&self, path: &FieldPath) -> Option<&Value> {
        let (last, parents) = path.segments().split_last()?;
        let mut tree = self;
        for segment in parents {
            tree = tree.get(segment)?.as_record()?;
        }
        tree.get(last)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
