//! Shell script text for `eval`: exports of parsed values and special outputs.

use crate::value::{ResultTree, Value};

/// Heredoc delimiter for help output.
const HELP_DELIMITER: &str = "ARGSHAPE_HELP";
/// Heredoc delimiter for version output.
const VERSION_DELIMITER: &str = "ARGSHAPE_VERSION";

/// Escape a string for safe use in a shell double-quoted context.
///
/// Escapes: $, `, \, ", and !
fn escape_shell_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '$' => escaped.push_str("\\$"),
            '`' => escaped.push_str("\\`"),
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '!' => escaped.push_str("\\!"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Shell variable segment for a field name: uppercase, `-` becomes `_`.
fn to_shell_var_name(name: &str) -> String {
    name.to_uppercase().replace('-', "_")
}

fn quoted(value: &Value) -> String {
    format!("\"{}\"", escape_shell_value(&value.to_string()))
}

fn write_exports(output: &mut String, tree: &ResultTree, var_prefix: &str) {
    for (name, value) in tree.iter() {
        let var_name = format!("{}{}", var_prefix, to_shell_var_name(name));
        match value {
            Value::Absent => {}
            Value::Record(child) => write_exports(output, child, &format!("{}_", var_name)),
            // Bash arrays cannot be exported.
            Value::List(items) => {
                let items: Vec<String> = items.iter().map(quoted).collect();
                output.push_str(&format!("{}=({})\n", var_name, items.join(" ")));
            }
            scalar => output.push_str(&format!("export {}={}\n", var_name, quoted(scalar))),
        }
    }
}

/// Generate shell statements assigning every parsed value.
///
/// Nested records join their path with `_`, e.g. `server.port` becomes
/// `PREFIX_SERVER_PORT`. Sequences become arrays and absent values are
/// left unset.
pub fn generate_exports_string(tree: &ResultTree, prefix: &str) -> String {
    let mut output = String::new();
    write_exports(&mut output, tree, prefix);
    output
}

/// Generate a script that prints each line of `message` to stderr and exits 1.
pub fn generate_error_script(message: &str) -> String {
    let mut output = String::new();
    for line in message.lines() {
        output.push_str(&format!(
            "echo \"argshape: {}\" >&2\n",
            escape_shell_value(line)
        ));
    }
    output.push_str("exit 1\n");
    output
}

/// Generate a script that prints the help text and exits 0.
pub fn generate_help_script(help_text: &str) -> String {
    heredoc(HELP_DELIMITER, help_text)
}

/// Generate a script that prints the version and exits 0.
pub fn generate_version_script(version_text: &str) -> String {
    heredoc(VERSION_DELIMITER, version_text)
}

fn heredoc(delimiter: &str, text: &str) -> String {
    let newline = if text.ends_with('\n') { "" } else { "\n" };
    format!(
        "cat <<'{delimiter}'\n{text}{newline}{delimiter}\nexit 0\n",
        delimiter = delimiter,
        text = text,
        newline = newline
    )
}
