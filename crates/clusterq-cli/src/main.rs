//! clusterq CLI tool.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "clusterq")]
#[command(about = "Batch queue client", long_about = None)]
struct Cli {
    /// Server URI, for commands that talk to a running daemon
    #[arg(long, env = "CLUSTERQ_URI", global = true)]
    uri: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the registered backends
    Backends,
    /// Start a daemon hosting a backend
    Serve {
        /// Backend to host (slurm, local)
        backend: String,
        /// Host to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,
        /// Port to bind; 0 picks a free port
        #[arg(long, default_value = "0")]
        port: u16,
    },
    /// Probe a running server
    Ping,
    /// Submit a shell command as a job
    Submit {
        /// Backend to submit through when no URI is given
        #[arg(long, default_value = "local")]
        backend: String,
        /// Directory for the submission artifacts
        #[arg(long)]
        dir: PathBuf,
        /// Directory where the scheduler node sees the artifacts
        #[arg(long)]
        remote_dir: Option<PathBuf>,
        /// Job name; generated when omitted
        #[arg(long)]
        name: Option<String>,
        /// Submission directive, key=value; repeatable
        #[arg(long = "option", value_name = "KEY=VALUE")]
        options: Vec<String>,
        /// Poll until the job finishes and print its captured stdout
        #[arg(long)]
        watch: bool,
        /// The shell command to run
        command: String,
    },
    /// Show the queue
    Status {
        /// Restrict to one job id
        #[arg(long)]
        job: Option<String>,
    },
    /// Cancel jobs by id
    Cancel {
        /// Job ids to cancel
        ids: Vec<String>,
    },
    /// Show accounting rows
    Metrics {
        /// Restrict to one job id
        #[arg(long)]
        job: Option<String>,
    },
    /// Check that the backend behind the server is usable
    Selftest,
    /// Ask a running daemon to shut down
    Shutdown,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Backends => commands::backends(),
        Commands::Serve {
            backend,
            host,
            port,
        } => {
            commands::serve(&backend, &host, port).await?;
        }
        Commands::Ping => {
            commands::ping(&require_uri(cli.uri)?).await?;
        }
        Commands::Submit {
            backend,
            dir,
            remote_dir,
            name,
            options,
            watch,
            command,
        } => {
            commands::submit::run(commands::submit::Args {
                backend,
                uri: cli.uri,
                dir,
                remote_dir,
                name,
                options,
                watch,
                command,
            })
            .await?;
        }
        Commands::Status { job } => {
            commands::status(&require_uri(cli.uri)?, job.as_deref()).await?;
        }
        Commands::Cancel { ids } => {
            commands::cancel(&require_uri(cli.uri)?, &ids).await?;
        }
        Commands::Metrics { job } => {
            commands::metrics(&require_uri(cli.uri)?, job.as_deref()).await?;
        }
        Commands::Selftest => {
            commands::selftest(&require_uri(cli.uri)?).await?;
        }
        Commands::Shutdown => {
            commands::shutdown(&require_uri(cli.uri)?).await?;
        }
    }

    Ok(())
}

fn require_uri(uri: Option<String>) -> anyhow::Result<String> {
    uri.ok_or_else(|| anyhow::anyhow!("this command needs --uri (or CLUSTERQ_URI)"))
}
