//! Token matching: assigns raw command-line tokens to grammar slots.
//!
//! Matching never coerces. It records the raw strings each slot received and
//! collects every structural problem it finds instead of stopping at the
//! first one.

use crate::config::DuplicatePolicy;
use crate::grammar::{Consumption, FlagAction, FlagBinding, Grammar, Slot, SlotId};
use crate::value::FieldPath;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, trace};

/// Structural errors found while matching tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unrecognized argument: {0}")]
    UnknownFlag(String),

    #[error("missing value for option: {flag}")]
    MissingValue { path: FieldPath, flag: String },

    #[error("missing required argument: {flag}")]
    MissingRequired { path: FieldPath, flag: String },

    #[error("missing required positional argument: {0}")]
    MissingPositional(FieldPath),

    #[error("unexpected argument: {0}")]
    UnexpectedToken(String),

    #[error("option {flag} does not take a value")]
    UnexpectedValue { flag: String },

    #[error("option {flag} given more than once")]
    Conflict { path: FieldPath, flag: String },
}

impl ParseError {
    /// Field the error concerns, if it concerns one.
    pub fn path(&self) -> Option<&FieldPath> {
        match self {
            ParseError::MissingValue { path, .. }
            | ParseError::MissingRequired { path, .. }
            | ParseError::Conflict { path, .. } => Some(path),
            ParseError::MissingPositional(path) => Some(path),
            ParseError::UnknownFlag(_)
            | ParseError::UnexpectedToken(_)
            | ParseError::UnexpectedValue { .. } => None,
        }
    }
}

/// Raw values one slot received.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    pub values: Vec<String>,
    pub occurrences: usize,
}

/// Everything matching produced for one token sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParseState {
    captures: HashMap<FieldPath, Capture>,
    errors: Vec<ParseError>,
    leftovers: Vec<String>,
    help_requested: bool,
    version_requested: bool,
}

impl ParseState {
    pub fn capture(&self, path: &FieldPath) -> Option<&Capture> {
        self.captures.get(path)
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    /// Tokens passed through untouched when unknown arguments are allowed.
    pub fn leftovers(&self) -> &[String] {
        &self.leftovers
    }

    pub fn help_requested(&self) -> bool {
        self.help_requested
    }

    pub fn version_requested(&self) -> bool {
        self.version_requested
    }
}

/// True for tokens that read as numbers, e.g. `-1` or `-2.5`.
fn is_number(token: &str) -> bool {
    let digits = token.strip_prefix('-').unwrap_or(token);
    digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') && token.parse::<f64>().is_ok()
}

/// True for tokens that would be read as a flag (or the separator).
fn is_flag_shaped(token: &str) -> bool {
    token.starts_with('-') && token.len() > 1 && !is_number(token)
}

/// True if `token` spells a reserved flag, alone or inside a short cluster.
///
/// A cluster is read up to its first value-taking or unknown short, the
/// same way the matcher reads it, so `-vh` asks for help but `-ph` does not.
fn names_flag(grammar: &Grammar, token: &str, reserved: impl Fn(&str) -> bool) -> bool {
    if reserved(token) {
        return true;
    }
    if token.starts_with("--") || !is_flag_shaped(token) {
        return false;
    }
    for c in token[1..].chars() {
        if reserved(&format!("-{}", c)) {
            return true;
        }
        match grammar.lookup_short(c) {
            Some(binding) if binding.action != FlagAction::Value => {}
            _ => return false,
        }
    }
    false
}

/// Match `tokens` against `grammar`.
///
/// `-h`/`--help` anywhere before a `--` separator short-circuits to a help
/// request, and `-V`/`--version` to a version request when the program has
/// a version. Help takes priority.
pub fn match_tokens<S: AsRef<str>>(grammar: &Grammar, tokens: &[S]) -> ParseState {
    let tokens: Vec<&str> = tokens.iter().map(AsRef::as_ref).collect();
    let mut state = ParseState::default();

    let options_end = tokens
        .iter()
        .position(|t| *t == "--")
        .unwrap_or(tokens.len());
    let options = &tokens[..options_end];
    if options
        .iter()
        .any(|t| names_flag(grammar, t, |f| grammar.is_help_flag(f)))
    {
        debug!("help requested");
        state.help_requested = true;
        return state;
    }
    if options
        .iter()
        .any(|t| names_flag(grammar, t, |f| grammar.is_version_flag(f)))
    {
        debug!("version requested");
        state.version_requested = true;
        return state;
    }

    let mut matcher = Matcher {
        grammar,
        tokens: &tokens,
        pos: 0,
        state,
        next_positional: 0,
        conflicted: HashSet::new(),
        reported: HashSet::new(),
    };
    matcher.scan();
    matcher.finish();

    debug!(
        tokens = tokens.len(),
        captured = matcher.state.captures.len(),
        errors = matcher.state.errors.len(),
        leftovers = matcher.state.leftovers.len(),
        "matched tokens"
    );
    matcher.state
}

struct Matcher<'g, 't> {
    grammar: &'g Grammar,
    tokens: &'t [&'t str],
    pos: usize,
    state: ParseState,
    next_positional: usize,
    /// Slots that already raised a duplicate conflict
    conflicted: HashSet<SlotId>,
    /// Slots that already raised a missing-value error
    reported: HashSet<SlotId>,
}

impl<'g, 't> Matcher<'g, 't> {
    fn next_token(&mut self) -> Option<&'t str> {
        let token = self.tokens.get(self.pos).copied()?;
        self.pos += 1;
        Some(token)
    }

    /// Next token if it can be taken as a value.
    fn peek_value(&self) -> Option<&'t str> {
        self.tokens
            .get(self.pos)
            .copied()
            .filter(|t| !is_flag_shaped(t))
    }

    fn scan(&mut self) {
        let mut parsing_options = true;

        while let Some(token) = self.next_token() {
            trace!(token, parsing_options, "scanning token");
            if parsing_options && token == "--" {
                parsing_options = false;
                continue;
            }

            if parsing_options && token.starts_with("--") {
                self.long_option(token);
            } else if parsing_options && is_flag_shaped(token) {
                self.short_options(token);
            } else {
                self.positional(token);
            }
        }
    }

    fn long_option(&mut self, token: &'t str) {
        let body = &token[2..];
        let (name, inline) = match body.split_once('=') {
            Some((name, value)) => (name, Some(value)),
            None => (body, None),
        };

        match self.grammar.lookup_long(name) {
            Some(binding) => self.apply(binding, format!("--{}", name), inline),
            None => self.unknown(token, format!("--{}", name)),
        }
    }

    fn short_options(&mut self, token: &'t str) {
        let body = &token[1..];

        for (i, c) in body.char_indices() {
            let flag = format!("-{}", c);
            let binding = match self.grammar.lookup_short(c) {
                Some(binding) => binding,
                None => {
                    // The rest of the cluster belongs to the unknown flag.
                    let rest = format!("-{}", &body[i..]);
                    self.unknown(&rest, flag);
                    return;
                }
            };

            if binding.action == FlagAction::Value {
                // The rest of the cluster, if any, is the value: -p8080
                let rest = &body[i + c.len_utf8()..];
                let inline = (!rest.is_empty()).then_some(rest);
                self.apply(binding, flag, inline);
                return;
            }
            self.apply(binding, flag, None);
        }
    }

    fn unknown(&mut self, spelling: &str, flag: String) {
        if self.grammar.settings().allow_unknown {
            self.state.leftovers.push(spelling.to_string());
        } else {
            self.state.errors.push(ParseError::UnknownFlag(flag));
        }
    }

    fn apply(&mut self, binding: FlagBinding, flag: String, inline: Option<&str>) {
        let grammar = self.grammar;
        let slot = grammar.slot(binding.slot);

        match binding.action {
            FlagAction::SetTrue => {
                // --flag=false is accepted and checked during coercion.
                let value = inline.unwrap_or("true").to_string();
                self.record(binding.slot, &flag, vec![value]);
            }
            FlagAction::SetFalse => {
                if inline.is_some() {
                    self.state
                        .errors
                        .push(ParseError::UnexpectedValue { flag });
                    return;
                }
                self.record(binding.slot, &flag, vec!["false".to_string()]);
            }
            FlagAction::Value => {
                let values = match inline {
                    Some(value) => vec![value.to_string()],
                    None => self.take_values(slot.consumption),
                };
                let min = match slot.consumption {
                    Consumption::Run { min } => min,
                    _ => 1,
                };
                if values.len() < min {
                    self.reported.insert(binding.slot);
                    self.state.errors.push(ParseError::MissingValue {
                        path: slot.path.clone(),
                        flag,
                    });
                    return;
                }
                let values = split_values(slot, values);
                self.record(binding.slot, &flag, values);
            }
        }
    }

    fn take_values(&mut self, consumption: Consumption) -> Vec<String> {
        let mut values = Vec::new();
        while let Some(value) = self.peek_value() {
            values.push(value.to_string());
            self.pos += 1;
            if !matches!(consumption, Consumption::Run { .. }) {
                break;
            }
        }
        values
    }

    fn positional(&mut self, token: &str) {
        let grammar = self.grammar;
        let id = match grammar.positionals().get(self.next_positional) {
            Some(&id) => id,
            None => {
                if grammar.settings().allow_unknown {
                    self.state.leftovers.push(token.to_string());
                } else {
                    self.state
                        .errors
                        .push(ParseError::UnexpectedToken(token.to_string()));
                }
                return;
            }
        };

        let slot = grammar.slot(id);
        let values = split_values(slot, vec![token.to_string()]);
        self.record(id, &slot.display_name(), values);
        if !slot.is_variadic() {
            self.next_positional += 1;
        }
    }

    /// Store values for a slot, applying the duplicate policy.
    fn record(&mut self, id: SlotId, flag: &str, values: Vec<String>) {
        let grammar = self.grammar;
        let slot = grammar.slot(id);
        let policy = grammar.settings().on_duplicate;

        match self.state.captures.entry(slot.path.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(Capture {
                    values,
                    occurrences: 1,
                });
            }
            Entry::Occupied(mut entry) => {
                let capture = entry.get_mut();
                capture.occurrences += 1;
                if slot.consumption.is_repeatable() {
                    capture.values.extend(values);
                } else if policy == DuplicatePolicy::LastWins {
                    capture.values = values;
                } else if self.conflicted.insert(id) {
                    self.state.errors.push(ParseError::Conflict {
                        path: slot.path.clone(),
                        flag: flag.to_string(),
                    });
                }
            }
        }
    }

    /// Report required slots that never received a value.
    fn finish(&mut self) {
        let grammar = self.grammar;
        for (id, slot) in grammar.slots().iter().enumerate() {
            if !slot.spec.required
                || self.reported.contains(&id)
                || self.state.captures.contains_key(&slot.path)
            {
                continue;
            }
            let error = if slot.spec.positional {
                ParseError::MissingPositional(slot.path.clone())
            } else {
                ParseError::MissingRequired {
                    path: slot.path.clone(),
                    flag: slot.display_name(),
                }
            };
            self.state.errors.push(error);
        }
    }
}

fn split_values(slot: &Slot, values: Vec<String>) -> Vec<String> {
    match slot.spec.delimiter {
        Some(delimiter) if slot.spec.shape.is_sequence() => values
            .iter()
            .flat_map(|v| v.split(delimiter).map(str::to_string))
            .collect(),
        _ => values,
    }
}
