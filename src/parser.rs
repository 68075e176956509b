//! Parsing front-end: tokens in, a result tree or a typed record out.

use crate::coerce::validate;
use crate::config::SchemaDocument;
use crate::error::{Diagnostic, Error, ParseFailure};
use crate::grammar::Grammar;
use crate::matcher::match_tokens;
use crate::reconstruct::reconstruct_into;
use crate::value::ResultTree;
use serde::de::DeserializeOwned;
use std::marker::PhantomData;
use tracing::debug;

/// Outcome of parsing arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome<T> {
    /// Successfully parsed arguments.
    Parsed(T),
    /// User requested help (-h or --help).
    Help,
    /// User requested version (-V or --version).
    Version,
}

impl<T> ParseOutcome<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ParseOutcome<U> {
        match self {
            ParseOutcome::Parsed(value) => ParseOutcome::Parsed(f(value)),
            ParseOutcome::Help => ParseOutcome::Help,
            ParseOutcome::Version => ParseOutcome::Version,
        }
    }

    /// The parsed value, if parsing ran to completion.
    pub fn parsed(self) -> Option<T> {
        match self {
            ParseOutcome::Parsed(value) => Some(value),
            _ => None,
        }
    }
}

/// Values of a successful parse.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed {
    pub values: ResultTree,
    /// Unmatched tokens, only ever non-empty when unknown arguments are allowed
    pub leftovers: Vec<String>,
}

impl Grammar {
    /// Match, coerce and validate `tokens`.
    ///
    /// Matching and coercion errors are reported together; coercion runs
    /// even when matching already failed.
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> Result<ParseOutcome<Parsed>, ParseFailure> {
        let state = match_tokens(self, tokens);
        if state.help_requested() {
            return Ok(ParseOutcome::Help);
        }
        if state.version_requested() {
            return Ok(ParseOutcome::Version);
        }

        let mut diagnostics: Vec<Diagnostic> = state
            .errors()
            .iter()
            .cloned()
            .map(Diagnostic::Parse)
            .collect();

        match validate(self, &state) {
            Ok(values) if diagnostics.is_empty() => {
                return Ok(ParseOutcome::Parsed(Parsed {
                    values,
                    leftovers: state.leftovers().to_vec(),
                }));
            }
            Ok(_) => {}
            Err(errors) => diagnostics.extend(errors.into_iter().map(Diagnostic::Value)),
        }

        debug!(diagnostics = diagnostics.len(), "parse rejected");
        Err(ParseFailure::new(diagnostics))
    }
}

/// Compile `doc` and parse `tokens` against it.
pub fn parse_args<S: AsRef<str>>(
    doc: &SchemaDocument,
    tokens: &[S],
) -> Result<ParseOutcome<Parsed>, Error> {
    let grammar = Grammar::compile(doc)?;
    Ok(grammar.parse(tokens)?)
}

/// A type that describes its own command-line schema.
pub trait Record: DeserializeOwned {
    fn schema() -> SchemaDocument;
}

/// Parser producing values of `T`, with the grammar compiled once.
#[derive(Debug, Clone)]
pub struct TypedParser<T> {
    grammar: Grammar,
    target: PhantomData<fn() -> T>,
}

impl<T: Record> TypedParser<T> {
    pub fn new() -> Result<Self, Error> {
        Self::with_schema(&T::schema())
    }
}

impl<T: DeserializeOwned> TypedParser<T> {
    pub fn with_schema(doc: &SchemaDocument) -> Result<Self, Error> {
        Ok(Self {
            grammar: Grammar::compile(doc)?,
            target: PhantomData,
        })
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// Parse into `T`, dropping any leftovers.
    pub fn parse<S: AsRef<str>>(&self, tokens: &[S]) -> Result<ParseOutcome<T>, Error> {
        Ok(self.parse_known(tokens)?.map(|(value, _)| value))
    }

    /// Parse into `T`, also returning tokens nothing matched.
    pub fn parse_known<S: AsRef<str>>(
        &self,
        tokens: &[S],
    ) -> Result<ParseOutcome<(T, Vec<String>)>, Error> {
        Ok(match self.grammar.parse(tokens)? {
            ParseOutcome::Parsed(parsed) => {
                let value = reconstruct_into(&parsed.values)?;
                ParseOutcome::Parsed((value, parsed.leftovers))
            }
            ParseOutcome::Help => ParseOutcome::Help,
            ParseOutcome::Version => ParseOutcome::Version,
        })
    }
}
