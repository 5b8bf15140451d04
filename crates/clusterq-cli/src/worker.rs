//! Worker entry point, invoked from inside generated batch scripts.
//!
//! Loads a task descriptor, runs it, and records the outcome in the
//! result capture file. The exit code reflects whether an outcome was
//! recorded, not whether the task succeeded: a failing task is data for
//! the client, not a batch-script failure.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "clusterq-worker")]
#[command(about = "Task entry point for clusterq batch jobs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a serialized task and record its outcome
    Run {
        /// Path to the task descriptor
        #[arg(long)]
        task: PathBuf,
        /// Path of the result capture file to write
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run { task, out } => {
            clusterq_backends::task_runner::run_task(&task, &out).await?;
        }
    }
    Ok(())
}
