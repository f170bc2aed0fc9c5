//! Forge CLI — a thin client over `forge-kernel`: parses a subcommand,
//! bootstraps the Dependencies Container in-process, and renders the
//! resulting event stream. Unlike the teacher's daemon-backed CLI, Forge
//! has no background process to connect to: the kernel runs inside this
//! binary for the lifetime of the command.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use forge_kernel::Kernel;

mod commands;
mod formatter;
mod theme;

use commands::{doctor, init, run, sessions, workflow};
use formatter::OutputFormat;
use theme::Theme;

/// Forge — an agent execution substrate.
#[derive(Parser)]
#[command(name = "forge", author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output rendering: `pretty` or `json`.
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive session (the default with no subcommand).
    Run {
        /// Resume a specific session by id.
        #[arg(short, long)]
        session: Option<String>,
    },
    /// Run or resume a declarative workflow.
    Workflow {
        #[command(subcommand)]
        command: WorkflowCommands,
    },
    /// List, inspect, or delete persisted sessions.
    Sessions {
        #[command(subcommand)]
        command: SessionCommands,
    },
    /// Cancel a live agent run or workflow run by id.
    Cancel {
        /// The run or workflow id to cancel.
        id: String,
    },
    /// Run environment and configuration health checks.
    Doctor,
    /// Scaffold a `.forge/` directory in the current workspace.
    Init,
}

#[derive(Subcommand)]
enum WorkflowCommands {
    /// Start a named workflow from `.forge/workflows/<name>.yaml`.
    Run {
        /// Workflow name (without the `.yaml` extension).
        name: String,
        /// Path to a JSON file of run-level inputs.
        #[arg(long)]
        input: Option<String>,
        /// A `key=value` input override, repeatable.
        #[arg(long = "set", value_parser = parse_key_val)]
        set: Vec<(String, String)>,
    },
    /// Resume a checkpointed workflow run by id.
    Resume {
        /// The workflow run id.
        id: String,
    },
}

#[derive(Subcommand)]
enum SessionCommands {
    /// List every persisted session.
    List,
    /// Show a session's full transcript.
    Show {
        /// The session id.
        id: String,
    },
    /// Delete a session and its backups.
    Delete {
        /// The session id.
        id: String,
    },
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (key, value) = s.split_once('=').ok_or_else(|| format!("expected key=value, got {s:?}"))?;
    Ok((key.to_string(), value.to_string()))
}

fn build_workflow_inputs(input: Option<&str>, set: &[(String, String)]) -> Result<serde_json::Value> {
    let mut value = match input {
        Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        None => serde_json::Value::Object(serde_json::Map::new()),
    };
    let serde_json::Value::Object(map) = &mut value else {
        anyhow::bail!("--input must contain a JSON object");
    };
    for (key, raw) in set {
        let parsed = serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.clone()));
        map.insert(key.clone(), parsed);
    }
    Ok(value)
}

fn init_logging(verbose: bool) {
    let workspace_root = std::env::current_dir().ok();
    let config = forge_config::load(workspace_root.as_deref(), None).ok();
    let log_config = match &config {
        Some(cfg) => {
            let mut lc = forge_telemetry::LogConfig::from_section(&cfg.logging);
            if verbose {
                lc = forge_telemetry::LogConfig::new("debug").with_format(forge_telemetry::LogFormat::Pretty);
            }
            lc
        }
        None => {
            let level = if verbose { "debug" } else { "info" };
            forge_telemetry::LogConfig::new(level).with_format(forge_telemetry::LogFormat::Pretty)
        }
    };
    if let Err(error) = forge_telemetry::setup_logging(&log_config) {
        eprintln!("failed to initialize logging: {error}");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let format = match cli.format.as_str() {
        "json" => OutputFormat::Json,
        _ => OutputFormat::Pretty,
    };

    match cli.command {
        Some(Commands::Init) => init::run(),
        Some(Commands::Doctor) => doctor::run().await,
        Some(Commands::Run { session }) => {
            let kernel = bootstrap().await?;
            run::run(&kernel, session, format).await
        }
        Some(Commands::Workflow { command }) => {
            let kernel = bootstrap().await?;
            match command {
                WorkflowCommands::Run { name, input, set } => {
                    let inputs = build_workflow_inputs(input.as_deref(), &set)?;
                    workflow::run(&kernel, &name, inputs, format).await
                }
                WorkflowCommands::Resume { id } => workflow::resume(&kernel, &id, format).await,
            }
        }
        Some(Commands::Sessions { command }) => {
            let kernel = bootstrap().await?;
            match command {
                SessionCommands::List => sessions::list(&kernel).await,
                SessionCommands::Show { id } => sessions::show(&kernel, &id).await,
                SessionCommands::Delete { id } => sessions::delete(&kernel, &id).await,
            }
        }
        Some(Commands::Cancel { id }) => {
            let kernel = bootstrap().await?;
            if kernel.cancel(&id) {
                println!("{}", Theme::success(&format!("cancelled {id}")));
            } else {
                println!("{}", Theme::warning(&format!("no live run or workflow with id {id}")));
            }
            Ok(())
        }
        None => {
            let kernel = bootstrap().await?;
            run::run(&kernel, None, format).await
        }
    }
}

async fn bootstrap() -> Result<Kernel> {
    let workspace_root = std::env::current_dir()?;
    Ok(Kernel::bootstrap(workspace_root).await?)
}
