//! Error types for clusterq.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Missing or invalid caller-supplied configuration. Never retried.
    #[error("usage error: {0}")]
    Usage(String),

    /// A single transport-level failure (bind refused, connection closed
    /// mid-call). Retryable up to a caller-specified bound.
    #[error("transport error: {0}")]
    Transport(String),

    /// The retry budget for a connection was exhausted.
    #[error("unable to connect to server: {0}")]
    ConnectionFailed(String),

    #[error("daemon start failed: {0}")]
    DaemonStart(String),

    #[error("unknown queue backend: {0}")]
    UnknownBackend(String),

    /// A status string the taxonomy does not know about. Surfaced, never
    /// silently treated as active or done.
    #[error("unmapped queue state: {0}")]
    UnmappedState(String),

    /// Local and remote job identity disagree. Never auto-corrected.
    #[error("consistency violation: {0}")]
    Consistency(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A result capture file exists but does not deserialize.
    #[error("result data corrupted: {0}")]
    ResultCorrupted(String),

    /// A task recorded a failure in its result file.
    #[error("task failed: {0}")]
    TaskFailed(String),

    #[error("artifact generation failed: {0}")]
    Artifact(String),

    /// Submission returned no job id; the job was not launched.
    #[error("submission failed: backend returned no job id")]
    SubmissionFailed,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, Error>;
