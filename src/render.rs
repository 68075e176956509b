//! Rendering a result tree back into command-line tokens.

use crate::grammar::{Consumption, Grammar, Slot};
use crate::value::{ResultTree, Value};

impl Grammar {
    /// Tokens that parse back to `tree`.
    ///
    /// Flags use the `--name=value` form so values that look like flags
    /// survive; positionals follow a `--` separator. Switches at false are
    /// written only when they have a negation flag.
    pub fn to_tokens(&self, tree: &ResultTree) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut positionals = Vec::new();

        for slot in self.slots() {
            let value = match tree.get_path(&slot.path) {
                Some(value) => value,
                None => continue,
            };

            if slot.spec.positional {
                match value {
                    Value::List(items) => positionals.extend(items.iter().map(Value::to_string)),
                    Value::Absent => {}
                    value => positionals.push(value.to_string()),
                }
                continue;
            }

            match value {
                Value::Absent => {}
                Value::Bool(on) if slot.consumption == Consumption::Switch => {
                    if *on {
                        tokens.push(switch(slot));
                    } else if let Some(negation) = &slot.negation {
                        tokens.push(format!("--{}", negation));
                    }
                }
                Value::List(items) if items.is_empty() => {
                    // A bare run flag means an explicit empty list.
                    if matches!(slot.consumption, Consumption::Run { .. }) {
                        tokens.push(switch(slot));
                    }
                }
                Value::List(items) => tokens.extend(items.iter().map(|item| spelled(slot, item))),
                value => tokens.push(spelled(slot, value)),
            }
        }

        if !positionals.is_empty() {
            tokens.push("--".to_string());
            tokens.extend(positionals);
        }
        tokens
    }
}

fn switch(slot: &Slot) -> String {
    match (&slot.long, slot.spec.short) {
        (Some(long), _) => format!("--{}", long),
        (None, Some(short)) => format!("-{}", short),
        (None, None) => slot.display_name(),
    }
}

fn spelled(slot: &Slot, value: &Value) -> String {
    match (&slot.long, slot.spec.short) {
        (Some(long), _) => format!("--{}={}", long, value),
        (None, Some(short)) => format!("-{}{}", short, value),
        (None, None) => value.to_string(),
    }
}
