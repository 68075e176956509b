//! Error types shared across the parsing pipeline.

use crate::coerce::ValueError;
use crate::config::ConfigError;
use crate::matcher::ParseError;
use crate::reconstruct::BindError;
use crate::schema::SchemaError;
use crate::value::FieldPath;
use std::fmt;
use thiserror::Error;

/// One problem with the user's input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Diagnostic {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl Diagnostic {
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            Diagnostic::Parse(e) => e.path(),
            Diagnostic::Value(e) => Some(&e.path),
        }
    }
}

/// Every diagnostic from one rejected token sequence, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    diagnostics: Vec<Diagnostic>,
}

impl ParseFailure {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self { diagnostics }
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn parse_errors(&self) -> impl Iterator<Item = &ParseError> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::Parse(e) => Some(e),
            Diagnostic::Value(_) => None,
        })
    }

    pub fn value_errors(&self) -> impl Iterator<Item = &ValueError> {
        self.diagnostics.iter().filter_map(|d| match d {
            Diagnostic::Value(e) => Some(e),
            Diagnostic::Parse(_) => None,
        })
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// One diagnostic per line.
impl fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, diagnostic) in self.diagnostics.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseFailure {}

/// Any error the library can return.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid schema document: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    Invalid(#[from] ParseFailure),

    #[error(transparent)]
    Bind(#[from] BindError),
}
