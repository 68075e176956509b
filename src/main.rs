//! argshape - schema-driven argument parsing from the command line.

use anyhow::{anyhow, Context, Result};
use argshape::{
    generate_error_script, generate_exports_string, generate_help, generate_help_script,
    generate_usage, generate_version, generate_version_script, reconstruct, Grammar, ParseOutcome,
    SchemaDocument,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "ARGSHAPE_LOG";

/// Typed argument parsing driven by a JSON record schema.
#[derive(Parser, Debug)]
#[command(name = "argshape", version, about, disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Where the schema document comes from.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
struct SchemaSource {
    /// Inline JSON schema document
    #[arg(long)]
    schema: Option<String>,

    /// Path to a JSON schema document
    #[arg(long, value_name = "PATH")]
    schema_file: Option<PathBuf>,
}

impl SchemaSource {
    fn load(&self) -> Result<SchemaDocument> {
        let json = match (&self.schema, &self.schema_file) {
            (Some(json), _) => json.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("failed to read schema file {}", path.display()))?,
            (None, None) => return Err(anyhow!("no schema given")),
        };
        SchemaDocument::from_json(&json).context("failed to parse schema JSON")
    }

    fn compile(&self) -> Result<Grammar> {
        let doc = self.load()?;
        Grammar::compile(&doc).context("invalid schema")
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
enum OutputFormat {
    /// Print `{"values": ..., "leftovers": [...]}` to stdout
    #[default]
    Json,
    /// Print a shell script for `eval`
    Env,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse arguments against a schema
    Parse {
        #[command(flatten)]
        source: SchemaSource,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,

        /// Shell variable prefix for env output
        #[arg(long, default_value = "")]
        prefix: String,

        /// Program name shown in help and version output
        #[arg(long)]
        name: Option<String>,

        /// Arguments to parse
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print help text for a schema
    Help {
        #[command(flatten)]
        source: SchemaSource,

        /// Program name shown in the help text
        #[arg(long)]
        name: Option<String>,

        /// Print only the usage line
        #[arg(long)]
        usage: bool,
    },

    /// Print the compiled flag table as JSON
    Grammar {
        #[command(flatten)]
        source: SchemaSource,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse `args` and render the result as JSON.
fn parse_to_json(grammar: &Grammar, name: &str, args: &[String]) -> Result<String> {
    let outcome = grammar.parse(args).context("failed to parse arguments")?;
    Ok(match outcome {
        ParseOutcome::Parsed(parsed) => {
            let document = serde_json::json!({
                "values": reconstruct(&parsed.values),
                "leftovers": parsed.leftovers,
            });
            format!("{}\n", serde_json::to_string_pretty(&document)?)
        }
        ParseOutcome::Help => generate_help(grammar, name),
        ParseOutcome::Version => generate_version(grammar, name),
    })
}

/// Parse `args` into a shell script for `eval`.
///
/// Failures are rendered as a script too, so the caller can always evaluate it.
fn parse_to_script(grammar: &Grammar, name: &str, prefix: &str, args: &[String]) -> String {
    match grammar.parse(args) {
        Ok(ParseOutcome::Parsed(parsed)) => generate_exports_string(&parsed.values, prefix),
        Ok(ParseOutcome::Help) => generate_help_script(&generate_help(grammar, name)),
        Ok(ParseOutcome::Version) => generate_version_script(&generate_version(grammar, name)),
        Err(failure) => generate_error_script(&failure.to_string()),
    }
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    debug!(command = ?cli.command, "starting");

    match cli.command {
        Commands::Parse {
            source,
            format,
            prefix,
            name,
            args,
        } => {
            let grammar = source.compile()?;
            let name = name.unwrap_or_else(|| grammar.info().name.clone());

            match format {
                OutputFormat::Json => print!("{}", parse_to_json(&grammar, &name, &args)?),
                OutputFormat::Env => print!("{}", parse_to_script(&grammar, &name, &prefix, &args)),
            }
        }
        Commands::Help {
            source,
            name,
            usage,
        } => {
            let grammar = source.compile()?;
            let name = name.unwrap_or_else(|| grammar.info().name.clone());
            if usage {
                println!("{}", generate_usage(&grammar, &name));
            } else {
                print!("{}", generate_help(&grammar, &name));
            }
        }
        Commands::Grammar { source } => {
            let grammar = source.compile()?;
            println!("{}", serde_json::to_string_pretty(&grammar.flags())?);
        }
    }

    Ok(())
}
