//! Worker-side task execution.
//!
//! The `clusterq-worker` binary calls into this module from inside a batch
//! job: it loads the serialized [`TaskSpec`], runs the program with the
//! payload on stdin, and records a [`TaskOutcome`] in the result capture
//! file. A failing task is recorded in the outcome, not propagated as a
//! batch-script failure.

use std::path::Path;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};

use clusterq_core::work::{TaskOutcome, TaskSpec};
use clusterq_core::{Error, Result};

/// Run the task described at `task_path` and write the outcome to
/// `out_path`. Returns the recorded outcome.
pub async fn run_task(task_path: &Path, out_path: &Path) -> Result<TaskOutcome> {
    let data = std::fs::read(task_path)
        .map_err(|e| Error::NotFound(format!("task file {}: {e}", task_path.display())))?;
    let spec: TaskSpec = serde_json::from_slice(&data)
        .map_err(|e| Error::ResultCorrupted(format!("task file: {e}")))?;

    info!(program = %spec.program, "Running task");
    let outcome = execute(&spec).await;
    if let TaskOutcome::Err { message, .. } = &outcome {
        error!(error = %message, "Task reported failure");
    }

    std::fs::write(out_path, serde_json::to_vec_pretty(&outcome)?)?;
    Ok(outcome)
}

async fn execute(spec: &TaskSpec) -> TaskOutcome {
    let mut child = match tokio::process::Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return TaskOutcome::Err {
                message: format!("failed to spawn {}: {e}", spec.program),
                exit_code: None,
            };
        }
    };

    let payload = spec.payload.to_string();
    if let Some(mut stdin) = child.stdin.take() {
        if let Err(e) = stdin.write_all(payload.as_bytes()).await {
            return TaskOutcome::Err {
                message: format!("failed to write payload: {e}"),
                exit_code: None,
            };
        }
        // Close stdin so programs reading to EOF can finish.
        drop(stdin);
    }

    let output = match child.wait_with_output().await {
        Ok(output) => output,
        Err(e) => {
            return TaskOutcome::Err {
                message: format!("failed to wait for {}: {e}", spec.program),
                exit_code: None,
            };
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = match stderr.trim() {
            "" => format!("{} exited with {:?}", spec.program, output.status.code()),
            s => s.to_string(),
        };
        return TaskOutcome::Err {
            message,
            exit_code: output.status.code(),
        };
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    // Structured output when the program emits JSON, plain text otherwise.
    let value = serde_json::from_str(&stdout)
        .unwrap_or_else(|_| serde_json::Value::String(stdout.trim_end().to_string()));
    TaskOutcome::Ok(value)
}
