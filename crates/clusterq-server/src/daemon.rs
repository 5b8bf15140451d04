//! Daemon supervisor.
//!
//! Turns a queue backend into a detached, network-reachable process. The
//! parent spawns `clusterqd serve`, waits for a one-line ok/ko handshake on
//! the child's stdout, then validates the on-disk identity artifacts and
//! the child's liveness before reporting `(pid, uri)` back to the caller.
//!
//! Identity artifacts are keyed by `(backend, instance)`; the instance id
//! is reserved by atomically creating the pid file, so concurrent starts
//! for the same backend cannot collide.

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::timeout;
use tracing::{error, info, warn};

use clusterq_core::{Error, Result};

/// Handshake tokens written by the child before entering its accept loop.
pub const TOKEN_OK: &str = "ok";
pub const TOKEN_KO: &str = "ko";

/// How long the parent waits for the child handshake. The child writes a
/// token on every exit path, so this only guards against a hung child.
const STARTUP_TIMEOUT: Duration = Duration::from_secs(30);

/// A started daemon.
#[derive(Debug, Clone)]
pub struct DaemonHandle {
    pub pid: u32,
    pub uri: String,
    pub instance: u32,
}

/// The three on-disk identity artifacts of one daemon instance.
#[derive(Debug, Clone)]
pub struct IdentityPaths {
    pub pid_file: PathBuf,
    pub uri_file: PathBuf,
    pub log_file: PathBuf,
}

impl IdentityPaths {
    pub fn new(state_dir: &Path, backend: &str, instance: u32) -> Self {
        let stem = format!("{backend}-{instance}");
        Self {
            pid_file: state_dir.join(format!("{stem}.pid")),
            uri_file: state_dir.join(format!("{stem}.uri")),
            log_file: state_dir.join(format!("{stem}.log")),
        }
    }

    /// Remove all three artifacts. Always removes them together; missing
    /// files are not an error.
    pub fn cleanup(&self) {
        for path in [&self.pid_file, &self.uri_file, &self.log_file] {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %path.display(), error = %e, "Failed to remove identity artifact");
                }
            }
        }
    }
}

/// Reserve the next free instance id for `backend` by atomically creating
/// its pid file.
pub fn allocate_instance(state_dir: &Path, backend: &str) -> Result<(u32, IdentityPaths)> {
    for instance in 0.. {
        let paths = IdentityPaths::new(state_dir, backend, instance);
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&paths.pid_file)
        {
            Ok(_) => return Ok((instance, paths)),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }
    unreachable!("instance id space exhausted")
}

/// Probe a process with signal 0. EPERM means the process exists but is
/// not ours, which still counts as alive.
fn process_alive(pid: i32) -> bool {
    match kill(Pid::from_raw(pid), None) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}

/// Validate the identity artifacts after a successful handshake.
fn validate(paths: &IdentityPaths) -> Result<(u32, String)> {
    let spid = std::fs::read_to_string(&paths.pid_file)
        .map_err(|_| Error::DaemonStart("PID file not found".into()))?;
    let pid: i32 = spid
        .trim()
        .parse()
        .map_err(|_| Error::DaemonStart("PID file was not written".into()))?;

    if !process_alive(pid) {
        error!(pid, "Server process does not exist");
        return Err(Error::DaemonStart("server process does not exist".into()));
    }

    let uri = std::fs::read_to_string(&paths.uri_file)
        .map_err(|_| Error::DaemonStart("URI file not found".into()))?;

    Ok((pid as u32, uri.trim().to_string()))
}

/// Locate the `clusterqd` executable: next to the current executable
/// first, then on PATH.
fn daemon_executable() -> Result<PathBuf> {
    let exe = std::env::current_exe()?;
    if let Some(dir) = exe.parent() {
        let candidate = dir.join("clusterqd");
        if candidate.is_file() {
            return Ok(candidate);
        }
        // Test binaries live one level below the bin directory.
        if let Some(parent) = dir.parent() {
            let candidate = parent.join("clusterqd");
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    which::which("clusterqd").map_err(|_| Error::DaemonStart("clusterqd executable not found".into()))
}

/// Start a detached daemon hosting `backend` and verify it came up.
///
/// On any failure after the instance id was reserved, all identity
/// artifacts are removed together before the error is returned. Retrying
/// is the caller's responsibility.
pub async fn start(backend: &str, host: &str, port: u16, state_dir: &Path) -> Result<DaemonHandle> {
    let (instance, paths) = allocate_instance(state_dir, backend)?;
    info!(backend, instance, "Starting daemon");

    match spawn_and_handshake(backend, host, port, instance, state_dir, &paths).await {
        Ok(handle) => Ok(handle),
        Err(e) => {
            paths.cleanup();
            Err(e)
        }
    }
}

async fn spawn_and_handshake(
    backend: &str,
    host: &str,
    port: u16,
    instance: u32,
    state_dir: &Path,
    paths: &IdentityPaths,
) -> Result<DaemonHandle> {
    let exe = daemon_executable()?;
    let mut child = tokio::process::Command::new(exe)
        .arg("serve")
        .arg("--backend")
        .arg(backend)
        .arg("--host")
        .arg(host)
        .arg("--port")
        .arg(port.to_string())
        .arg("--instance")
        .arg(instance.to_string())
        .arg("--state-dir")
        .arg(state_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::DaemonStart("child stdout was not captured".into()))?;
    let mut lines = BufReader::new(stdout).lines();

    // The child writes a token on every exit path; the timeout is only
    // defensive hardening against a hung child.
    let token = match timeout(STARTUP_TIMEOUT, lines.next_line()).await {
        Err(_) => return Err(Error::DaemonStart("timed out waiting for the daemon".into())),
        Ok(Err(e)) => return Err(Error::DaemonStart(format!("handshake read failed: {e}"))),
        Ok(Ok(token)) => token,
    };

    match token.as_deref().map(str::trim) {
        Some(TOKEN_OK) => {}
        Some(TOKEN_KO) => return Err(Error::DaemonStart("daemon reported a startup failure".into())),
        other => {
            return Err(Error::DaemonStart(format!(
                "unexpected handshake token: {other:?}"
            )));
        }
    }

    let (pid, uri) = validate(paths)?;
    info!(pid, uri = %uri, "Daemon is up");
    Ok(DaemonHandle { pid, uri, instance })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_ids_skip_existing_pid_files() {
        let tmp = tempfile::tempdir().unwrap();
        let (first, _paths) = allocate_instance(tmp.path(), "slurm").unwrap();
        assert_eq!(first, 0);

        // The reservation itself occupies id 0.
        let (second, _paths) = allocate_instance(tmp.path(), "slurm").unwrap();
        assert_eq!(second, 1);

        // Other backends allocate independently.
        let (other, _paths) = allocate_instance(tmp.path(), "local").unwrap();
        assert_eq!(other, 0);
    }

    #[test]
    fn cleanup_removes_all_artifacts_together() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IdentityPaths::new(tmp.path(), "slurm", 0);
        std::fs::write(&paths.pid_file, "123").unwrap();
        std::fs::write(&paths.uri_file, "http://x").unwrap();
        std::fs::write(&paths.log_file, "").unwrap();

        paths.cleanup();
        assert!(!paths.pid_file.exists());
        assert!(!paths.uri_file.exists());
        assert!(!paths.log_file.exists());

        // Idempotent on a second pass.
        paths.cleanup();
    }

    #[test]
    fn validate_rejects_an_unwritten_pid_file() {
        let tmp = tempfile::tempdir().unwrap();
        let (_, paths) = allocate_instance(tmp.path(), "slurm").unwrap();
        // Reserved but never written by a child.
        let err = validate(&paths).unwrap_err();
        assert!(matches!(err, Error::DaemonStart(_)));
    }

    #[test]
    fn validate_rejects_a_dead_pid() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IdentityPaths::new(tmp.path(), "slurm", 0);
        // PID 2^22-ish beyond pid_max on most systems.
        std::fs::write(&paths.pid_file, "4194000").unwrap();
        std::fs::write(&paths.uri_file, "http://127.0.0.1:1").unwrap();
        let err = validate(&paths).unwrap_err();
        assert!(matches!(err, Error::DaemonStart(_)));
    }

    #[test]
    fn validate_accepts_a_live_pid() {
        let tmp = tempfile::tempdir().unwrap();
        let paths = IdentityPaths::new(tmp.path(), "slurm", 0);
        std::fs::write(&paths.pid_file, std::process::id().to_string()).unwrap();
        std::fs::write(&paths.uri_file, "http://127.0.0.1:9000\n").unwrap();
        let (pid, uri) = validate(&paths).unwrap();
        assert_eq!(pid, std::process::id());
        assert_eq!(uri, "http://127.0.0.1:9000");
    }

    #[test]
    fn failed_start_leaves_zero_artifacts() {
        // Simulate the parent path after a reservation whose child never
        // wrote a pid: validation fails and cleanup must leave nothing.
        let tmp = tempfile::tempdir().unwrap();
        let (_, paths) = allocate_instance(tmp.path(), "slurm").unwrap();
        std::fs::write(&paths.log_file, "").unwrap();

        assert!(validate(&paths).is_err());
        paths.cleanup();

        let leftovers: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "identity artifacts were left behind");
    }

    /// Full spawn/handshake against a built `clusterqd`.
    /// Run with: cargo test -- --ignored
    #[tokio::test]
    #[ignore]
    async fn start_and_probe_local_daemon() {
        let tmp = tempfile::tempdir().unwrap();
        let handle = start("local", "127.0.0.1", 0, tmp.path()).await.unwrap();
        assert!(handle.uri.starts_with("http://127.0.0.1:"));
        assert!(process_alive(handle.pid as i32));

        let paths = IdentityPaths::new(tmp.path(), "local", handle.instance);
        assert!(paths.pid_file.is_file());
        assert!(paths.uri_file.is_file());

        let _ = kill(Pid::from_raw(handle.pid as i32), nix::sys::signal::SIGTERM);
        paths.cleanup();
    }
}
