//! Local synchronous backend.
//!
//! Runs jobs without a queue system or a remote cluster. There is exactly
//! one job: the id is always "0" and the queue answer is always the
//! terminal "complete" state once the script has exited zero. `submit`
//! does not return until the script has finished.

use async_trait::async_trait;
use std::path::Path;
use tracing::error;

use clusterq_core::backend::{MetricsRow, QueueBackend, QueueEntry};
use clusterq_core::options::SubmitOptions;
use clusterq_core::script::ScriptPaths;
use clusterq_core::work::WorkItem;
use clusterq_core::Result;

use crate::runner::{CommandRunner, SystemRunner};
use crate::scriptgen;
use crate::slurm::METRICS_FIELDS;

/// The fixed id of the single local job.
pub const LOCAL_JOB_ID: &str = "0";

/// The fixed status reported for the local job.
pub const LOCAL_STATUS: &str = "complete";

const SHELL: &str = "bash";

pub struct LocalBackend {
    runner: Box<dyn CommandRunner>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self {
            runner: Box::new(SystemRunner),
        }
    }

    pub fn with_runner(runner: Box<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl Default for LocalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueBackend for LocalBackend {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn submit(&self, script_path: &Path) -> Result<Option<String>> {
        let args = vec![script_path.display().to_string()];
        let out = self.runner.run(SHELL, &args).await?;
        if !out.success {
            error!(code = ?out.code, "Local job failed");
            return Ok(None);
        }
        Ok(Some(LOCAL_JOB_ID.to_string()))
    }

    async fn cancel(&self, _job_ids: &[String]) -> Result<bool> {
        Ok(true)
    }

    async fn queue(&self, _job_id: Option<&str>) -> Result<Vec<QueueEntry>> {
        Ok(vec![QueueEntry::new(LOCAL_JOB_ID, LOCAL_STATUS)])
    }

    async fn metrics(&self, _job_id: Option<&str>) -> Result<Vec<MetricsRow>> {
        Ok(vec![vec![String::new(); METRICS_FIELDS.len()]])
    }

    async fn self_test(&self) -> bool {
        which::which(SHELL).is_ok()
    }

    fn generate_artifacts(
        &self,
        script: &ScriptPaths,
        options: &SubmitOptions,
        work: &WorkItem,
    ) -> Result<bool> {
        scriptgen::generate(script, options, work)
    }

    fn in_process(&self) -> bool {
        true
    }
}
