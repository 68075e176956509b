//! argshape - typed command-line parsing driven by record schemas.
//!
//! A schema document describes a tree of record types. The library compiles
//! it into an immutable [`Grammar`], matches command-line tokens against it,
//! coerces the matched strings into typed values, and hands back either a
//! [`ResultTree`], JSON, or any `serde` type with the same shape.

pub mod coerce;
pub mod config;
pub mod error;
pub mod grammar;
pub mod help;
pub mod matcher;
pub mod output;
pub mod parser;
pub mod reconstruct;
mod render;
pub mod schema;
pub mod value;

pub use coerce::{validate, ValueError};
pub use config::{
    ConfigError, DuplicatePolicy, EnumDef, FieldDef, RecordDef, SchemaDocument, SequenceStyle,
    Settings,
};
pub use error::{Diagnostic, Error, ParseFailure};
pub use grammar::{synthesize, FlagInfo, Grammar, ProgramInfo};
pub use help::{generate_help, generate_usage, generate_version};
pub use matcher::{match_tokens, ParseError, ParseState};
pub use output::{
    generate_error_script, generate_exports_string, generate_help_script, generate_version_script,
};
pub use parser::{parse_args, ParseOutcome, Parsed, Record, TypedParser};
pub use reconstruct::{reconstruct, reconstruct_into, BindError};
pub use schema::{introspect, SchemaError, SchemaNode};
pub use value::{FieldPath, ResultTree, Value};
