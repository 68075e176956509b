//! JSON schema documents describing record types for argshape.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The minimum supported schema version.
pub const MIN_SCHEMA_VERSION: u32 = 1;
/// The maximum supported schema version.
pub const MAX_SCHEMA_VERSION: u32 = 1;

/// Errors that can occur while reading a schema document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse JSON schema: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("unsupported schema version {0} (supported: 1)")]
    UnsupportedSchemaVersion(u32),
}

/// What happens when a non-repeatable flag is supplied more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// The last occurrence replaces earlier ones.
    #[default]
    LastWins,
    /// Every repeat after the first is reported as a conflict.
    Error,
}

/// How a sequence flag collects its values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SequenceStyle {
    /// `--files a b c`: one occurrence takes a contiguous run of values.
    #[default]
    Run,
    /// `--file a --file b`: each occurrence takes exactly one value.
    Repeat,
}

fn default_true() -> bool {
    true
}

/// Parser-wide settings, fixed when the grammar is compiled.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Pass unknown flags and surplus positionals through as leftovers
    #[serde(default)]
    pub allow_unknown: bool,
    #[serde(default)]
    pub on_duplicate: DuplicatePolicy,
    /// Default style for sequence fields that don't choose one
    #[serde(default)]
    pub sequence_style: SequenceStyle,
    /// Reserve `-h`/`--help` and report help requests
    #[serde(default = "default_true")]
    pub add_help: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            allow_unknown: false,
            on_duplicate: DuplicatePolicy::default(),
            sequence_style: SequenceStyle::default(),
            add_help: true,
        }
    }
}

/// Declaration of a single record field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldDef {
    /// Field name, also the key in the reconstructed record
    pub name: String,
    /// Type expression, e.g. `int`, `optional<path>`, `list<Level>`, `Server`
    #[serde(rename = "type")]
    pub type_name: String,
    /// Default value; its absence makes most shapes required
    pub default: Option<serde_json::Value>,
    /// Short option character (e.g., 'v' for -v)
    pub short: Option<char>,
    /// Long option name, overriding the one derived from `name`
    pub long: Option<String>,
    /// Extra long spellings
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Help text for this field
    pub help: Option<String>,
    /// Placeholder shown for the value in help output
    pub metavar: Option<String>,
    /// Match by position instead of by flag
    #[serde(default)]
    pub positional: bool,
    /// Inline choice set for `type: "enum"`
    pub choices: Option<Vec<String>>,
    /// Sequence style override for this field
    pub sequence: Option<SequenceStyle>,
    /// Split each sequence value on this character
    pub delimiter: Option<char>,
    /// Synthesize a `--no-<name>` flag for a bool field
    #[serde(default)]
    pub negatable: bool,
    /// Merge a nested record's flags into the parent namespace
    #[serde(default)]
    pub flatten: bool,
}

impl FieldDef {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            default: None,
            short: None,
            long: None,
            aliases: Vec::new(),
            help: None,
            metavar: None,
            positional: false,
            choices: None,
            sequence: None,
            delimiter: None,
            negatable: false,
            flatten: false,
        }
    }

    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn with_long(mut self, long: impl Into<String>) -> Self {
        self.long = Some(long.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_metavar(mut self, metavar: impl Into<String>) -> Self {
        self.metavar = Some(metavar.into());
        self
    }

    pub fn with_choices<I, S>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_sequence(mut self, style: SequenceStyle) -> Self {
        self.sequence = Some(style);
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = Some(delimiter);
        self
    }

    pub fn positional(mut self) -> Self {
        self.positional = true;
        self
    }

    pub fn negatable(mut self) -> Self {
        self.negatable = true;
        self
    }

    pub fn flatten(mut self) -> Self {
        self.flatten = true;
        self
    }
}

/// A named record type: an ordered list of fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordDef {
    pub name: String,
    /// Heading used when the record's flags are grouped in help output
    pub title: Option<String>,
    pub help: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

impl RecordDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            help: None,
            fields: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_field(mut self, field: FieldDef) -> Self {
        self.fields.push(field);
        self
    }
}

/// A named enum type: a closed set of choices.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EnumDef {
    pub name: String,
    pub choices: Vec<String>,
}

fn default_schema_version() -> u32 {
    1
}

/// Top-level schema document.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaDocument {
    /// Schema version for the document format (default: 1)
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Program name used in help and version output
    pub name: Option<String>,
    pub description: Option<String>,
    /// Program version; reserves `-V`/`--version` when set
    pub version: Option<String>,
    /// Root record name (default: the first record)
    pub root: Option<String>,
    #[serde(default)]
    pub records: Vec<RecordDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
    #[serde(default)]
    pub settings: Settings,
}

impl SchemaDocument {
    /// Start a document whose root is `root`.
    pub fn new(root: RecordDef) -> Self {
        Self {
            schema_version: default_schema_version(),
            name: None,
            description: None,
            version: None,
            root: None,
            records: vec![root],
            enums: Vec::new(),
            settings: Settings::default(),
        }
    }

    /// Parse a JSON string into a SchemaDocument.
    pub fn from_json(json: &str) -> Result<SchemaDocument, ConfigError> {
        let doc: SchemaDocument = serde_json::from_str(json)?;
        doc.validate()?;
        Ok(doc)
    }

    /// Validate document-level settings.
    ///
    /// Type-level problems are reported later by introspection.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema_version < MIN_SCHEMA_VERSION || self.schema_version > MAX_SCHEMA_VERSION {
            return Err(ConfigError::UnsupportedSchemaVersion(self.schema_version));
        }
        Ok(())
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_record(mut self, record: RecordDef) -> Self {
        self.records.push(record);
        self
    }

    pub fn with_enum<I, S>(mut self, name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enums.push(EnumDef {
            name: name.into(),
            choices: choices.into_iter().map(Into::into).collect(),
        });
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Name of the root record: the explicit `root`, or the first record.
    pub fn root_name(&self) -> Option<&str> {
        self.root
            .as_deref()
            .or_else(|| self.records.first().map(|r| r.name.as_str()))
    }

    /// Get the effective program name, using the root record if none is set.
    pub fn effective_name(&self) -> &str {
        self.name
            .as_deref()
            .or_else(|| self.root_name())
            .unwrap_or("program")
    }
}
