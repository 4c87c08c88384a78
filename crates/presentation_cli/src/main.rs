//! Runtime warden CLI
//!
//! Installs, starts, inspects and stops the local model runtime.

#![allow(clippy::print_stdout)]

mod bootstrap;

use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use domain::{OperationOutcome, RuntimeEvent};
use infrastructure::{AppConfig, init_tracing};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Local runtime warden
#[derive(Debug, Parser)]
#[command(name = "warden-cli")]
#[command(author, version, about = "Manage the local model runtime", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./warden.toml when present)
    #[arg(short, long, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show install and running state
    Status,

    /// Ping the runtime and report its version
    Health,

    /// Download and install the runtime, then start it
    Install,

    /// Start the runtime if it is installed but not running
    Start,

    /// List models with their install and warm-up status
    Models,

    /// Pull a model into the runtime
    Pull {
        /// Model name, e.g. `llama3` or `phi3:mini`
        name: String,
    },

    /// Load a model into memory with a minimal generation
    Warm {
        /// Model name
        name: String,

        /// Probe again even if the model is already warm
        #[arg(long)]
        force: bool,
    },

    /// Warm up the selected chat model
    AutoWarm,

    /// Reconcile periodically and print events until Ctrl-C
    Watch,

    /// Stop the runtime
    Shutdown {
        /// Skip the graceful quit and kill immediately
        #[arg(long)]
        force: bool,
    },
}

/// Log filter override from verbosity count; none keeps the configured filter
const fn log_filter_from_verbosity(verbose: u8) -> Option<&'static str> {
    match verbose {
        0 => None,
        1 => Some("info"),
        2 => Some("debug"),
        _ => Some("trace"),
    }
}

/// Print every event until the channel closes
fn print_events(mut events: broadcast::Receiver<RuntimeEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "Unprintable event"),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event printer lagged");
                },
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

fn finish(operation: &str, outcome: OperationOutcome) -> anyhow::Result<()> {
    if outcome.success {
        println!("✅ {operation} succeeded");
        Ok(())
    } else {
        bail!(
            "{operation} failed: {}",
            outcome.error.unwrap_or_else(|| "unknown error".to_string())
        )
    }
}

fn print_json(value: &impl serde::Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    init_tracing(&config.telemetry, log_filter_from_verbosity(cli.verbose))?;

    let runtime = bootstrap::build(&config)?;
    let service = runtime.service;

    match cli.command {
        Commands::Status => {
            service.sync_state().await;
            print_json(&service.get_status().await)?;
        },

        Commands::Health => {
            let health = service.health_check().await;
            print_json(&health)?;
            if !health.reachable {
                bail!("runtime at {} is not reachable", config.runtime.base_url);
            }
        },

        Commands::Install => {
            let printer = print_events(runtime.events.subscribe());
            service.sync_state().await;
            let outcome = service.install().await;
            printer.abort();
            finish("Install", outcome)?;
        },

        Commands::Start => {
            service.sync_state().await;
            finish("Start", service.ensure_ready().await)?;
        },

        Commands::Models => {
            service.sync_state().await;
            let models = service.get_models_with_status().await;
            if models.is_empty() {
                println!("No models installed");
            }
            for model in models {
                let marker = if model.installing {
                    format!("{}%", model.progress)
                } else {
                    model.status.to_string()
                };
                println!("{:<40} {marker}", model.name);
            }
        },

        Commands::Pull { name } => {
            let printer = print_events(runtime.events.subscribe());
            let outcome = service.pull_model(&name).await;
            printer.abort();
            finish(&format!("Pull of {name}"), outcome)?;
        },

        Commands::Warm { name, force } => {
            finish(
                &format!("Warm-up of {name}"),
                service.warm_up_model(&name, force).await,
            )?;
        },

        Commands::AutoWarm => {
            finish("Auto warm-up", service.auto_warm_up().await)?;
        },

        Commands::Watch => {
            let printer = print_events(runtime.events.subscribe());
            service.init().await;
            println!("👀 Watching {} (Ctrl-C to stop)", config.runtime.base_url);
            tokio::signal::ctrl_c().await?;
            service.stop_reconciliation();
            printer.abort();
        },

        Commands::Shutdown { force } => {
            finish("Shutdown", service.shutdown(force).await)?;
        },
    }

    Ok(())
}
