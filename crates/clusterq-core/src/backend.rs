//! Queue backend contract.
//!
//! Every queue integration (Slurm, local synchronous runner, ...) implements
//! this one trait. Implementations are selected through the backend registry
//! at construction time, never via runtime type inspection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;
use crate::options::SubmitOptions;
use crate::script::ScriptPaths;
use crate::work::WorkItem;

/// One `(id, status)` pair from the queue view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: String,
    pub status: String,
}

impl QueueEntry {
    pub fn new(id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: status.into(),
        }
    }
}

/// One row of accounting fields (cpu/time/memory/energy usage).
pub type MetricsRow = Vec<String>;

/// Trait for queue backends.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Registry name of this backend.
    fn name(&self) -> &'static str;

    /// Hand a generated submission script to the scheduler. Returns the
    /// backend-assigned job id, or `None` when the submission command
    /// exited non-zero.
    async fn submit(&self, script_path: &Path) -> Result<Option<String>>;

    /// Best-effort termination request for the given jobs.
    async fn cancel(&self, job_ids: &[String]) -> Result<bool>;

    /// Current state for one job, or all known jobs when `job_id` is
    /// `None`. Merges the live queue view with the historical accounting
    /// view: live entries win, history-only entries are appended.
    async fn queue(&self, job_id: Option<&str>) -> Result<Vec<QueueEntry>>;

    /// Accounting rows for one or all jobs. Malformed or unavailable data
    /// degrades to an empty list, never an error.
    async fn metrics(&self, job_id: Option<&str>) -> Result<Vec<MetricsRow>>;

    /// Check that the scheduler executables this backend needs are
    /// reachable.
    async fn self_test(&self) -> bool;

    /// Render the submission artifacts for a job. Returns `Ok(false)` and
    /// leaves no submittable script behind when the task payload cannot be
    /// serialized.
    fn generate_artifacts(
        &self,
        script: &ScriptPaths,
        options: &SubmitOptions,
        work: &WorkItem,
    ) -> Result<bool>;

    /// Whether this backend runs inside the client process, without a
    /// daemon. Defaults to false.
    fn in_process(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for dyn QueueBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueueBackend").field("name", &self.name()).finish()
    }
}
