//! clusterq daemon.
//!
//! Child side of the daemon supervision protocol: binds the RPC listener,
//! persists the identity artifacts, routes its logs into the instance log
//! file, and writes a one-line ok/ko token to stdout before serving. A
//! token is written on every exit path so the supervising parent never
//! blocks.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clusterq_server::daemon::{IdentityPaths, TOKEN_KO, TOKEN_OK};
use clusterq_server::rpc::{self, RpcState};

#[derive(Parser)]
#[command(name = "clusterqd")]
#[command(about = "clusterq backend daemon", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Host a queue backend over the RPC surface.
    Serve {
        /// Backend to host (slurm, local).
        #[arg(long)]
        backend: String,

        /// Host to bind.
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind; 0 picks a free port.
        #[arg(long, default_value = "0")]
        port: u16,

        /// Instance id reserved by the supervisor.
        #[arg(long)]
        instance: u32,

        /// State directory holding the identity artifacts.
        #[arg(long)]
        state_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve {
            backend,
            host,
            port,
            instance,
            state_dir,
        } => serve(backend, host, port, instance, state_dir).await,
    }
}

async fn serve(
    backend: String,
    host: String,
    port: u16,
    instance: u32,
    state_dir: Option<PathBuf>,
) -> anyhow::Result<()> {
    let state_dir = match state_dir {
        Some(dir) => dir,
        None => clusterq_core::config::state_dir()?,
    };
    let paths = IdentityPaths::new(&state_dir, &backend, instance);

    match prepare(&backend, &host, port, &paths).await {
        Ok((listener, state)) => {
            handshake(TOKEN_OK);
            let shutdown = state.shutdown.clone();
            let app = rpc::router(state).layer(TraceLayer::new_for_http());
            info!(backend = %backend, "Entering the accept loop");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(shutdown))
                .await?;
            info!("Daemon stopped");
            Ok(())
        }
        Err(e) => {
            handshake(TOKEN_KO);
            Err(e)
        }
    }
}

async fn prepare(
    backend: &str,
    host: &str,
    port: u16,
    paths: &IdentityPaths,
) -> anyhow::Result<(TcpListener, RpcState)> {
    // Stdout carries the handshake and stderr is detached; logs go to the
    // instance log file instead.
    let log_file = std::fs::File::create(&paths.log_file)
        .with_context(|| format!("creating log file {}", paths.log_file.display()))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Arc::new(log_file))
        .with_ansi(false)
        .init();

    let backend = clusterq_backends::create_backend(backend)?;

    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding {host}:{port}"))?;
    let addr = listener.local_addr()?;
    let uri = format!("http://{addr}");

    let pid = std::process::id();
    info!(pid, "Saving PID to file");
    std::fs::write(&paths.pid_file, pid.to_string())?;
    info!(uri = %uri, "Saving URI to file");
    std::fs::write(&paths.uri_file, &uri)?;

    Ok((listener, RpcState::new(backend)))
}

/// Write a handshake token to the supervising parent. Failures are
/// ignored: with no parent listening there is nobody to notify.
fn handshake(token: &str) {
    let mut stdout = std::io::stdout();
    let _ = writeln!(stdout, "{token}");
    let _ = stdout.flush();
}

async fn shutdown_signal(notify: Arc<tokio::sync::Notify>) {
    tokio::select! {
        _ = notify.notified() => info!("Shutdown endpoint triggered"),
        _ = tokio::signal::ctrl_c() => info!("Interrupt received"),
    }
}
