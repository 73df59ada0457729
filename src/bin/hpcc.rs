//! Command-line client: spray files, read outputs and logical files, delete files, run scripts.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::error;
use tracing_subscriber::EnvFilter;

use hpcc_client::{HpccError, HpccResult};
use hpcc_client::config::ConnectionConfig;
use hpcc_client::delete::delete_logical_files;
use hpcc_client::download::DownloadOptions;
use hpcc_client::ecl::{FileLayout, TypePolicy};
use hpcc_client::execution::TracingObserver;
use hpcc_client::gateway::{Connection, EclGateway, RunOptions, ScriptSource, StoredValue};
use hpcc_client::ingestion::DelimitedOptions;
use hpcc_client::results::get_output;
use hpcc_client::save::{save_logical_file, save_output, save_outputs, to_csv_string};
use hpcc_client::spray::{SprayOptions, Sprayer};

#[derive(Parser)]
#[command(name = "hpcc")]
#[command(about = "Run ECL and move data in and out of an HPCC Systems cluster", long_about = None)]
struct Args {
    /// JSON connection settings. `HPCC_*` environment variables override them.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Cluster host, overriding the configured one.
    #[arg(long)]
    server: Option<String>,
    /// ESP port, overriding the configured one.
    #[arg(long)]
    port: Option<u16>,
    /// Keep workunits on the cluster after they complete.
    #[arg(long, default_value_t = false)]
    keep_workunits: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum Types {
    /// Declare every column STRING.
    String,
    /// Map inferred column types to ECL types.
    Inferred,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a delimited file to a logical file.
    Spray {
        source: PathBuf,
        target: String,
        #[arg(long, default_value_t = false)]
        overwrite: bool,
        #[arg(long, default_value_t = 10_000)]
        chunk_size: usize,
        #[arg(long, default_value_t = 3)]
        max_workers: usize,
        #[arg(long, default_value_t = 1)]
        max_attempts: usize,
        #[arg(long, default_value_t = ',')]
        delimiter: char,
        #[arg(long, value_enum, default_value_t = Types::String)]
        types: Types,
        /// Leave the temporary chunk files on the cluster.
        #[arg(long, default_value_t = false)]
        keep_temporaries: bool,
    },
    /// Run a script and save its outputs as CSV.
    GetOutput {
        script: PathBuf,
        /// Write the first output here; prints it when absent.
        #[arg(long)]
        out: Option<PathBuf>,
        /// Save every output into this directory instead of only the first.
        #[arg(long, conflicts_with = "out")]
        all_into: Option<PathBuf>,
        #[arg(long)]
        prefix: Option<String>,
        /// `name=value` for a stored variable. Repeatable.
        #[arg(long = "stored", value_parser = parse_stored)]
        stored: Vec<(String, StoredValue)>,
    },
    /// Download a logical file to CSV.
    GetFile {
        logical_file: String,
        out: PathBuf,
        /// The file is a sprayed CSV rather than a THOR file.
        #[arg(long, default_value_t = false)]
        csv: bool,
        #[arg(long, default_value_t = 10_000)]
        chunk_size: usize,
        #[arg(long, default_value_t = 15)]
        max_workers: usize,
        #[arg(long, default_value_t = 3)]
        max_attempts: usize,
    },
    /// Delete logical files.
    Delete {
        #[arg(required = true)]
        logical_files: Vec<String>,
    },
    /// Run a script and print its raw output.
    Run {
        script: PathBuf,
        #[arg(long = "stored", value_parser = parse_stored)]
        stored: Vec<(String, StoredValue)>,
        #[arg(long, default_value_t = false)]
        skip_syntax_check: bool,
    },
    /// Syntax-check a script without running it.
    CheckSyntax { script: PathBuf },
}

fn parse_stored(raw: &str) -> Result<(String, StoredValue), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{raw}'"))?;
    let value = if let Ok(v) = value.parse::<i64>() {
        StoredValue::Int(v)
    } else if let Ok(v) = value.parse::<bool>() {
        StoredValue::Bool(v)
    } else {
        StoredValue::Str(value.to_string())
    };
    Ok((name.to_string(), value))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hpcc_client=info,warn")),
        )
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "command failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> HpccResult<()> {
    let mut config = match &args.config {
        Some(path) => ConnectionConfig::from_json_file(path)?,
        None => ConnectionConfig::default(),
    }
    .with_overrides(|key| std::env::var(key).ok())?;
    if let Some(server) = args.server {
        config.server = server;
    }
    if let Some(port) = args.port {
        config.port = port;
    }
    let conn = Connection::new(config);
    let delete_workunit = !args.keep_workunits;

    match args.command {
        Command::Spray {
            source,
            target,
            overwrite,
            chunk_size,
            max_workers,
            max_attempts,
            delimiter,
            types,
            keep_temporaries,
        } => {
            let delimiter = u8::try_from(delimiter).map_err(|_| HpccError::InvalidInput {
                message: format!("delimiter '{delimiter}' is not a single byte"),
            })?;
            let options = SprayOptions {
                overwrite,
                chunk_size,
                max_workers,
                max_attempts,
                delete_workunit,
                delete_temporaries: !keep_temporaries,
                type_policy: match types {
                    Types::String => TypePolicy::StringOnly,
                    Types::Inferred => TypePolicy::Inferred,
                },
                delimited: DelimitedOptions {
                    delimiter,
                    ..Default::default()
                },
                num_threads: None,
            };
            let report = Sprayer::new(conn, options)?
                .with_observer(Arc::new(TracingObserver))
                .spray_file(&source, &target)?;
            println!("sprayed {} rows to {} ({:?})", report.rows, report.target, report.path);
            for failure in &report.cleanup_failures {
                eprintln!("temporary file not deleted: {failure}");
            }
        }
        Command::GetOutput {
            script,
            out,
            all_into,
            prefix,
            stored,
        } => {
            let options = RunOptions {
                delete_workunit,
                stored: stored.into_iter().collect(),
                ..Default::default()
            };
            let source = ScriptSource::Path(&script);
            match (out, all_into) {
                (_, Some(dir)) => {
                    for path in save_outputs(&conn, source, &options, &dir, &[], prefix.as_deref())? {
                        println!("{}", path.display());
                    }
                }
                (Some(path), None) => save_output(&conn, source, &options, &path)?,
                (None, None) => {
                    let data = get_output(&conn, source, &options)?;
                    print!("{}", to_csv_string(&data)?);
                }
            }
        }
        Command::GetFile {
            logical_file,
            out,
            csv,
            chunk_size,
            max_workers,
            max_attempts,
        } => {
            let options = DownloadOptions {
                layout: if csv { FileLayout::Csv } else { FileLayout::Thor },
                chunk_size,
                max_workers,
                max_attempts,
                delete_workunit,
                num_threads: None,
            };
            save_logical_file(&conn, &logical_file, &out, options)?;
        }
        Command::Delete { logical_files } => {
            delete_logical_files(&conn, &logical_files, delete_workunit)?;
        }
        Command::Run {
            script,
            stored,
            skip_syntax_check,
        } => {
            let options = RunOptions {
                syntax_check: !skip_syntax_check,
                delete_workunit,
                stored: stored.into_iter().collect(),
            };
            let out = conn.run(ScriptSource::Path(&script), &options)?;
            print!("{}", out.stdout);
            eprint!("{}", out.stderr);
        }
        Command::CheckSyntax { script } => {
            conn.syntax_check(&script)?;
            println!("{}: ok", script.display());
        }
    }
    Ok(())
}
