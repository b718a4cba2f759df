use std::{path::PathBuf, sync::Arc};

use clap::{AppSettings, Parser, Subcommand};
use indexmap::IndexMap;
use log::{debug, info};
use serde::Serialize;
use thiserror::Error;

use iact::{
    container::Value,
    containers::{all_schemas, schema_by_name},
    json,
    Container, ContainerError, ContainerSchema, FinalStatus, Provenance, ProvenanceError,
};

#[derive(Parser)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_long_args = true)]
struct Args {
    #[clap(subcommand)]
    command: Command,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences), global = true)]
    verbosity: u8,

    /// Write the provenance of this invocation to this file as JSON.
    #[clap(long, global = true)]
    provenance_log: Option<PathBuf>,

    /// Pretty-print JSON output with this many spaces per level.
    #[clap(long, global = true)]
    indent: Option<usize>,
}

#[derive(Subcommand, Serialize)]
#[serde(tag = "command", rename_all = "lowercase")]
enum Command {
    /// List the standard record types.
    Schemas,

    /// Print a freshly defaulted record, one field per line.
    Describe {
        /// Type name (e.g. HillasParametersContainer) or prefix (e.g. hillas).
        schema: String,
    },

    /// Print the flat table row of a freshly defaulted record and the units
    /// of its columns as JSON.
    Row {
        /// Type name (e.g. HillasParametersContainer) or prefix (e.g. hillas).
        schema: String,

        /// Use dotted field paths as column names instead of prefixes.
        #[clap(long)]
        no_prefix: bool,
    },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Schemas => "schemas",
            Command::Describe { .. } => "describe",
            Command::Row { .. } => "row",
        }
    }
}

#[derive(Error, Debug)]
enum IactError {
    #[error("No standard record type is called '{0}'; see `iact schemas`")]
    UnknownSchema(String),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Provenance(#[from] ProvenanceError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct RowOutput {
    row: IndexMap<String, Value>,
    units: IndexMap<String, String>,
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), IactError> {
    let args = Args::parse();
    setup_logging(args.verbosity);

    let mut provenance = Provenance::new();
    let activity = args.command.name();
    provenance.start_activity(activity);
    provenance.add_config(serde_json::to_value(&args.command)?)?;

    let result = run(&args.command, args.indent);
    let status = match result {
        Ok(()) => FinalStatus::Completed,
        Err(_) => FinalStatus::Error,
    };
    provenance.finish_activity_with_status(Some(activity), status)?;

    if let Some(path) = &args.provenance_log {
        provenance.write_json(path, args.indent)?;
        debug!("Provenance written to {}", path.display());
    }
    result
}

fn run(command: &Command, indent: Option<usize>) -> Result<(), IactError> {
    match command {
        Command::Schemas => {
            for schema in all_schemas() {
                let prefix = match schema.default_prefix() {
                    "" => "(none)",
                    p => p,
                };
                println!(
                    "{:<28} prefix {:<8} {} fields",
                    schema.name(),
                    prefix,
                    schema.len()
                );
            }
        }

        Command::Describe { schema } => {
            let container = Container::new(lookup(schema)?);
            print!("{container}");
        }

        Command::Row { schema, no_prefix } => {
            let container = Container::new(lookup(schema)?);
            let add_prefix = !no_prefix;
            let output = RowOutput {
                row: container.to_row(add_prefix),
                units: container.column_units(add_prefix),
            };
            info!("{} columns", output.row.len());
            println!("{}", json::to_string(&output, indent)?);
        }
    }
    Ok(())
}

fn lookup(name: &str) -> Result<Arc<ContainerSchema>, IactError> {
    schema_by_name(name)
        .map(Arc::clone)
        .ok_or_else(|| IactError::UnknownSchema(name.to_string()))
}

fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Warn),
        1 => builder.filter_level(log::LevelFilter::Info),
        2 => builder.filter_level(log::LevelFilter::Debug),
        _ => {
            builder.filter_level(log::LevelFilter::Trace);
            builder.format(|buf, record| {
                use std::io::Write;

                let timestamp = buf.timestamp();
                let level = record.level();
                let target = record.target();
                let line = record.line().unwrap_or(0);
                let message = record.args();

                writeln!(buf, "[{timestamp} {level} {target}:{line}] {message}")
            })
        }
    };
    builder.init();
}
