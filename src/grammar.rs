//! Grammar synthesis: a schema tree compiled into flag and positional tables.
//!
//! Every non-record field becomes a [`Slot`]. Long and short spellings from
//! all nesting levels share one namespace, so a collision anywhere in the
//! tree is a [`SchemaError`]. A compiled [`Grammar`] is never mutated.

use crate::config::{SchemaDocument, SequenceStyle, Settings};
use crate::schema::{introspect, Arity, FieldSpec, SchemaError, SchemaNode, TypeShape};
use crate::value::{FieldPath, Value};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Index of a slot in [`Grammar::slots`].
pub type SlotId = usize;

/// How a slot takes values from the token stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Consumption {
    /// Bool flag; present means true.
    Switch,
    /// Exactly one value per occurrence.
    Single,
    /// A contiguous run of values, at least `min`.
    Run { min: usize },
    /// One value per occurrence, accumulated across occurrences.
    Repeat,
}

impl Consumption {
    pub fn is_repeatable(&self) -> bool {
        matches!(self, Consumption::Run { .. } | Consumption::Repeat)
    }
}

/// What a matched flag spelling does to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagAction {
    Value,
    SetTrue,
    SetFalse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagBinding {
    pub slot: SlotId,
    pub action: FlagAction,
}

/// A compiled leaf field.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub path: FieldPath,
    pub spec: FieldSpec,
    /// Full long spelling including nesting prefixes, without `--`
    pub long: Option<String>,
    pub aliases: Vec<String>,
    /// `no-...` spelling that sets a switch to false
    pub negation: Option<String>,
    pub consumption: Consumption,
    /// Help heading of the enclosing nested record
    pub heading: Option<String>,
}

impl Slot {
    /// Spelling used in diagnostics.
    pub fn display_name(&self) -> String {
        if let Some(long) = &self.long {
            format!("--{}", long)
        } else if let Some(short) = self.spec.short {
            format!("-{}", short)
        } else {
            format!("<{}>", self.value_name())
        }
    }

    /// Placeholder for the slot's value in usage text.
    pub fn value_name(&self) -> String {
        self.spec
            .metavar
            .clone()
            .unwrap_or_else(|| self.spec.name.to_uppercase().replace('-', "_"))
    }

    pub fn is_variadic(&self) -> bool {
        self.spec.positional && matches!(self.consumption, Consumption::Run { .. })
    }
}

/// Program metadata carried for help and version output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgramInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

/// Metadata for one slot, for help and usage collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagInfo {
    pub path: FieldPath,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Every spelling, e.g. `--server-port`, `-p`
    pub flags: Vec<String>,
    pub negation: Option<String>,
    pub positional: bool,
    pub arity: Arity,
    pub consumption: Consumption,
    pub required: bool,
    pub default: Option<String>,
    pub choices: Option<Vec<String>>,
    pub help: Option<String>,
    pub metavar: Option<String>,
    pub heading: Option<String>,
}

/// Compiled, immutable argument grammar.
#[derive(Debug, Clone)]
pub struct Grammar {
    root: SchemaNode,
    slots: Vec<Slot>,
    longs: HashMap<String, FlagBinding>,
    shorts: HashMap<char, FlagBinding>,
    positionals: Vec<SlotId>,
    by_path: HashMap<FieldPath, SlotId>,
    settings: Settings,
    info: ProgramInfo,
}

impl Grammar {
    /// Introspect a schema document and synthesize its grammar.
    pub fn compile(doc: &SchemaDocument) -> Result<Grammar, SchemaError> {
        let root = introspect(doc)?;
        let info = ProgramInfo {
            name: doc.effective_name().to_string(),
            description: doc.description.clone(),
            version: doc.version.clone(),
        };
        synthesize(root, doc.settings.clone(), info)
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> &Slot {
        &self.slots[id]
    }

    pub fn slot_for(&self, path: &FieldPath) -> Option<&Slot> {
        self.by_path.get(path).map(|&id| &self.slots[id])
    }

    /// Positional slots in matching order.
    pub fn positionals(&self) -> &[SlotId] {
        &self.positionals
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn info(&self) -> &ProgramInfo {
        &self.info
    }

    /// Look up a long spelling (without the leading `--`).
    pub fn lookup_long(&self, name: &str) -> Option<FlagBinding> {
        self.longs.get(name).copied()
    }

    pub fn lookup_short(&self, short: char) -> Option<FlagBinding> {
        self.shorts.get(&short).copied()
    }

    pub fn is_help_flag(&self, token: &str) -> bool {
        self.settings.add_help && (token == "-h" || token == "--help")
    }

    pub fn is_version_flag(&self, token: &str) -> bool {
        self.info.version.is_some() && (token == "-V" || token == "--version")
    }

    /// Flag metadata for every slot, in declaration order.
    pub fn flags(&self) -> Vec<FlagInfo> {
        self.slots.iter().map(flag_info).collect()
    }
}

fn flag_info(slot: &Slot) -> FlagInfo {
    let mut flags = Vec::new();
    if let Some(long) = &slot.long {
        flags.push(format!("--{}", long));
    }
    if let Some(short) = slot.spec.short {
        flags.push(format!("-{}", short));
    }
    flags.extend(slot.aliases.iter().map(|a| format!("--{}", a)));

    let default = slot
        .spec
        .default
        .as_ref()
        .filter(|v| match v {
            Value::Absent => false,
            Value::List(items) => !items.is_empty(),
            _ => true,
        })
        .map(|v| v.to_string());

    FlagInfo {
        path: slot.path.clone(),
        type_name: slot.spec.shape.describe(),
        flags,
        negation: slot.negation.as_ref().map(|n| format!("--{}", n)),
        positional: slot.spec.positional,
        arity: slot.spec.arity,
        consumption: slot.consumption,
        required: slot.spec.required,
        default,
        choices: slot.spec.shape.choices().map(<[String]>::to_vec),
        help: slot.spec.help.clone(),
        metavar: slot.spec.metavar.clone(),
        heading: slot.heading.clone(),
    }
}

/// Compile a schema tree into a grammar.
pub fn synthesize(
    root: SchemaNode,
    settings: Settings,
    info: ProgramInfo,
) -> Result<Grammar, SchemaError> {
    let mut synth = Synthesizer::default();
    if settings.add_help {
        synth.reserved_longs.insert("help", "built-in --help");
        synth.reserved_shorts.insert('h', "built-in --help");
    }
    if info.version.is_some() {
        synth.reserved_longs.insert("version", "built-in --version");
        synth.reserved_shorts.insert('V', "built-in --version");
    }

    synth.node(&root, &FieldPath::root(), None, None)?;
    synth.check_positional_order()?;

    let by_path = synth
        .slots
        .iter()
        .enumerate()
        .map(|(id, slot)| (slot.path.clone(), id))
        .collect();

    debug!(
        slots = synth.slots.len(),
        long_flags = synth.longs.len(),
        positionals = synth.positionals.len(),
        "synthesized grammar"
    );

    Ok(Grammar {
        root,
        slots: synth.slots,
        longs: synth.longs,
        shorts: synth.shorts,
        positionals: synth.positionals,
        by_path,
        settings,
        info,
    })
}

fn join(prefix: Option<&str>, name: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}-{}", prefix, name),
        None => name.to_string(),
    }
}

#[derive(Default)]
struct Synthesizer {
    slots: Vec<Slot>,
    longs: HashMap<String, FlagBinding>,
    shorts: HashMap<char, FlagBinding>,
    positionals: Vec<SlotId>,
    reserved_longs: HashMap<&'static str, &'static str>,
    reserved_shorts: HashMap<char, &'static str>,
}

impl Synthesizer {
    fn node(
        &mut self,
        node: &SchemaNode,
        prefix: &FieldPath,
        flag_prefix: Option<&str>,
        heading: Option<&str>,
    ) -> Result<(), SchemaError> {
        for field in &node.fields {
            let path = prefix.child(&field.name);
            match &field.shape {
                TypeShape::Record(child) => {
                    // Flattened records carry no long of their own.
                    let child_prefix = match &field.long {
                        Some(long) => Some(join(flag_prefix, long)),
                        None => flag_prefix.map(str::to_string),
                    };
                    let child_heading = child.title.as_deref().unwrap_or(&child.type_name);
                    self.node(child, &path, child_prefix.as_deref(), Some(child_heading))?;
                }
                _ => self.leaf(field, path, flag_prefix, heading)?,
            }
        }
        Ok(())
    }

    fn leaf(
        &mut self,
        field: &FieldSpec,
        path: FieldPath,
        flag_prefix: Option<&str>,
        heading: Option<&str>,
    ) -> Result<(), SchemaError> {
        let id = self.slots.len();
        let consumption = match &field.shape {
            shape if shape.is_switch() => Consumption::Switch,
            TypeShape::Sequence { non_empty, .. } => {
                let min = usize::from(*non_empty);
                match (field.positional, field.sequence_style) {
                    (true, _) | (false, SequenceStyle::Run) => Consumption::Run { min },
                    (false, SequenceStyle::Repeat) => Consumption::Repeat,
                }
            }
            _ => Consumption::Single,
        };

        let long = field.long.as_deref().map(|l| join(flag_prefix, l));
        let aliases: Vec<String> = field
            .aliases
            .iter()
            .map(|a| join(flag_prefix, a))
            .collect();
        let negation = match (&long, field.negatable) {
            (Some(long), true) => Some(format!("no-{}", long)),
            _ => None,
        };

        if field.positional {
            self.positionals.push(id);
        } else {
            let action = if consumption == Consumption::Switch {
                FlagAction::SetTrue
            } else {
                FlagAction::Value
            };
            let binding = FlagBinding { slot: id, action };
            for spelling in long.iter().chain(&aliases) {
                self.bind_long(spelling, binding, &path)?;
            }
            if let Some(short) = field.short {
                self.bind_short(short, binding, &path)?;
            }
            if let Some(negation) = &negation {
                let binding = FlagBinding {
                    slot: id,
                    action: FlagAction::SetFalse,
                };
                self.bind_long(negation, binding, &path)?;
            }
        }

        self.slots.push(Slot {
            path,
            spec: field.clone(),
            long,
            aliases,
            negation,
            consumption,
            heading: heading.map(str::to_string),
        });
        Ok(())
    }

    fn owner(&self, slot: SlotId, current: &FieldPath) -> String {
        self.slots
            .get(slot)
            .map(|s| s.path.to_string())
            .unwrap_or_else(|| current.to_string())
    }

    fn bind_long(
        &mut self,
        name: &str,
        binding: FlagBinding,
        path: &FieldPath,
    ) -> Result<(), SchemaError> {
        let first = match (self.reserved_longs.get(name), self.longs.get(name)) {
            (Some(reserved), _) => Some(reserved.to_string()),
            (None, Some(existing)) => Some(self.owner(existing.slot, path)),
            (None, None) => None,
        };
        if let Some(first) = first {
            return Err(SchemaError::FlagCollision {
                flag: format!("--{}", name),
                first,
                second: path.to_string(),
            });
        }
        self.longs.insert(name.to_string(), binding);
        Ok(())
    }

    fn bind_short(
        &mut self,
        short: char,
        binding: FlagBinding,
        path: &FieldPath,
    ) -> Result<(), SchemaError> {
        let first = match (self.reserved_shorts.get(&short), self.shorts.get(&short)) {
            (Some(reserved), _) => Some(reserved.to_string()),
            (None, Some(existing)) => Some(self.owner(existing.slot, path)),
            (None, None) => None,
        };
        if let Some(first) = first {
            return Err(SchemaError::FlagCollision {
                flag: format!("-{}", short),
                first,
                second: path.to_string(),
            });
        }
        self.shorts.insert(short, binding);
        Ok(())
    }

    fn check_positional_order(&self) -> Result<(), SchemaError> {
        let mut variadic: Option<&FieldPath> = None;
        let mut optional: Option<&FieldPath> = None;

        for &id in &self.positionals {
            let slot = &self.slots[id];
            if let Some(variadic) = variadic {
                return Err(SchemaError::PositionalAfterVariadic {
                    field: slot.path.clone(),
                    variadic: variadic.clone(),
                });
            }
            if slot.spec.required {
                if let Some(optional) = optional {
                    return Err(SchemaError::RequiredAfterOptional {
                        field: slot.path.clone(),
                        optional: optional.clone(),
                    });
                }
            } else if optional.is_none() {
                optional = Some(&slot.path);
            }
            if slot.is_variadic() {
                variadic = Some(&slot.path);
            }
        }
        Ok(())
    }
}
