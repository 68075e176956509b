//! Help, usage and version text generation using Clap.

use crate::grammar::{Consumption, Grammar, Slot};
use crate::value::Value;
use clap::builder::PossibleValuesParser;
use clap::{Arg, ArgAction, Command};

/// Build a Clap Command mirroring a grammar (for help/usage generation).
pub fn build_command(grammar: &Grammar, effective_name: &str) -> Command {
    let info = grammar.info();
    let mut cmd = Command::new(effective_name.to_string())
        .disable_help_subcommand(true)
        .disable_help_flag(!grammar.settings().add_help);

    if let Some(ref version) = info.version {
        cmd = cmd.version(version.clone());
    }

    if let Some(ref description) = info.description {
        cmd = cmd.about(description.clone());
    } else if let Some(ref help) = grammar.root().help {
        cmd = cmd.about(help.clone());
    }

    let mut positional_index = 1usize;
    for slot in grammar.slots() {
        cmd = cmd.arg(build_arg(slot, &mut positional_index));
        if let Some(ref negation) = slot.negation {
            cmd = cmd.arg(build_negation(slot, negation));
        }
    }

    cmd
}

/// Build a Clap Arg from a grammar slot.
fn build_arg(slot: &Slot, positional_index: &mut usize) -> Arg {
    let spec = &slot.spec;
    let mut arg = Arg::new(slot.path.to_string());

    if spec.positional {
        arg = arg.index(*positional_index);
        *positional_index += 1;
    } else {
        if let Some(ref long) = slot.long {
            arg = arg.long(long.clone());
        }
        if let Some(short) = spec.short {
            arg = arg.short(short);
        }
        if !slot.aliases.is_empty() {
            arg = arg.visible_aliases(slot.aliases.clone());
        }
    }

    arg = match slot.consumption {
        Consumption::Switch => arg.action(ArgAction::SetTrue),
        Consumption::Single => arg.action(ArgAction::Set),
        Consumption::Repeat => arg.action(ArgAction::Append),
        // Positionals always show as taking at least one value
        Consumption::Run { min } if spec.positional => {
            arg.action(ArgAction::Append).num_args(min.max(1)..)
        }
        Consumption::Run { min } => arg.action(ArgAction::Append).num_args(min..),
    };

    if slot.consumption != Consumption::Switch {
        arg = arg.value_name(slot.value_name());

        match spec.default {
            Some(Value::List(ref items)) if !items.is_empty() => {
                arg = arg.default_values(items.iter().map(Value::to_string));
            }
            Some(Value::List(_)) | Some(Value::Absent) | None => {}
            Some(ref value) => {
                arg = arg.default_value(value.to_string());
            }
        }
    }

    if spec.required {
        arg = arg.required(true);
    }

    if let Some(choices) = spec.shape.choices() {
        arg = arg.value_parser(PossibleValuesParser::new(choices.to_vec()));
    }

    if let Some(ref help) = spec.help {
        arg = arg.help(help.clone());
    }

    if let Some(ref heading) = slot.heading {
        arg = arg.help_heading(heading.clone());
    }

    arg
}

fn build_negation(slot: &Slot, negation: &str) -> Arg {
    let mut arg = Arg::new(format!("{}:negation", slot.path))
        .long(negation.to_string())
        .action(ArgAction::SetTrue)
        .help(format!("Turn off {}", slot.display_name()));

    if let Some(ref heading) = slot.heading {
        arg = arg.help_heading(heading.clone());
    }
    arg
}

/// Generate the full help text for a grammar.
///
/// The `effective_name` parameter is the program name to show.
pub fn generate_help(grammar: &Grammar, effective_name: &str) -> String {
    let mut cmd = build_command(grammar, effective_name);
    cmd.render_help().to_string()
}

/// Generate the one-line usage summary.
pub fn generate_usage(grammar: &Grammar, effective_name: &str) -> String {
    let mut cmd = build_command(grammar, effective_name);
    cmd.render_usage().to_string()
}

/// Generate version string.
pub fn generate_version(grammar: &Grammar, effective_name: &str) -> String {
    let mut version = effective_name.to_string();
    if let Some(ref v) = grammar.info().version {
        version.push(' ');
        version.push_str(v);
    }
    version.push('\n');
    version
}
