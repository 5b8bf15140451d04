//! Job lifecycle.
//!
//! A [`Job`] tracks one unit of work from artifact generation through
//! submission, status polling and result collection. Its status starts at
//! the init sentinel and only ever holds values from the state taxonomy
//! (plus `disappeared` when the backend loses track of the job).

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use clusterq_core::backend::MetricsRow;
use clusterq_core::options::SubmitOptions;
use clusterq_core::script::ScriptPaths;
use clusterq_core::states::{self, INIT_STATUS};
use clusterq_core::work::{TaskOutcome, WorkItem};
use clusterq_core::{Error, Result};

use crate::session::Session;

/// Status recorded when the job is absent from both live and historic
/// queue views.
const DISAPPEARED_STATUS: &str = "disappeared";

pub struct Job {
    name: String,
    work: WorkItem,
    options: SubmitOptions,
    status: String,
    remote_id: Option<String>,
    launched: bool,
    script: ScriptPaths,
    session: Arc<Session>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("work", &self.work)
            .field("options", &self.options)
            .field("status", &self.status)
            .field("remote_id", &self.remote_id)
            .field("launched", &self.launched)
            .field("script", &self.script)
            .finish_non_exhaustive()
    }
}

impl Job {
    pub(crate) fn new(
        name: String,
        work: WorkItem,
        options: SubmitOptions,
        script: ScriptPaths,
        session: Arc<Session>,
    ) -> Self {
        Self {
            name,
            work,
            options,
            status: INIT_STATUS.to_string(),
            remote_id: None,
            launched: false,
            script,
            session,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn remote_id(&self) -> Option<&str> {
        self.remote_id.as_deref()
    }

    pub fn launched(&self) -> bool {
        self.launched
    }

    pub fn script(&self) -> &ScriptPaths {
        &self.script
    }

    pub fn options(&self) -> &SubmitOptions {
        &self.options
    }

    /// True once the job reached a terminal status, good or bad.
    pub fn finished(&self) -> bool {
        states::is_done(&self.status)
    }

    /// True while the job is progressing through the queue.
    pub fn running(&self) -> bool {
        states::is_active(&self.status)
    }

    /// Generate the submission artifacts and hand the batch script to the
    /// backend.
    ///
    /// Already-launched jobs are a no-op unless `force` is set; a forced
    /// relaunch resets the status to the init sentinel. The job is marked
    /// launched only after the backend returned a job id, so a failed
    /// submission leaves the job relaunchable.
    pub async fn launch(&mut self, force: bool) -> Result<()> {
        if self.launched && !force {
            warn!(job = %self.name, "Already launched, skipping");
            return Ok(());
        }

        let generated =
            self.session
                .backend()
                .generate_artifacts(&self.script, &self.options, &self.work)?;
        if !generated {
            return Err(Error::Artifact(format!(
                "could not generate submission artifacts for {}",
                self.name
            )));
        }

        match self.session.submit(&self.script.remote_batch()).await? {
            Some(id) => {
                info!(job = %self.name, id = %id, "Job submitted");
                self.remote_id = Some(id);
                self.launched = true;
                self.status = INIT_STATUS.to_string();
                Ok(())
            }
            None => {
                warn!(job = %self.name, "Backend accepted no submission");
                Err(Error::SubmissionFailed)
            }
        }
    }

    /// Refresh the status from the backend queue.
    ///
    /// No-op before launch and after a terminal status. A job missing from
    /// both the live and historic views is marked `disappeared`; an entry
    /// coming back under a different id is a consistency error and leaves
    /// the status untouched.
    pub async fn update(&mut self) -> Result<()> {
        if !self.launched {
            warn!(job = %self.name, "Not launched yet, nothing to update");
            return Ok(());
        }
        if self.finished() {
            warn!(job = %self.name, status = %self.status, "Already finished, nothing to update");
            return Ok(());
        }

        let id = match self.remote_id.as_deref() {
            Some(id) => id.to_string(),
            None => {
                return Err(Error::Consistency(format!(
                    "job {} is launched but has no remote id",
                    self.name
                )));
            }
        };

        let entries = self.session.queue(Some(&id)).await?;
        let entry = match entries.first() {
            Some(entry) => entry,
            None => {
                warn!(job = %self.name, id = %id, "Job vanished from the queue");
                self.status = DISAPPEARED_STATUS.to_string();
                return Ok(());
            }
        };

        if entry.id != id {
            return Err(Error::Consistency(format!(
                "queried job {id} but the backend answered for {}",
                entry.id
            )));
        }

        // Reject unmapped statuses before storing anything.
        states::classify(&entry.status)?;
        self.status = entry.status.to_ascii_lowercase();
        Ok(())
    }

    /// Ask the backend to cancel this job.
    pub async fn cancel(&self) -> Result<bool> {
        match self.remote_id.as_deref() {
            Some(id) => self.session.cancel(&[id.to_string()]).await,
            None => {
                warn!(job = %self.name, "Not launched, nothing to cancel");
                Ok(false)
            }
        }
    }

    /// Accounting rows for this job.
    pub async fn metrics(&self) -> Result<Vec<MetricsRow>> {
        self.session.metrics(self.remote_id.as_deref()).await
    }

    fn stdout_path(&self) -> PathBuf {
        match self.options.get("output").and_then(|v| v.as_str()) {
            Some(path) => PathBuf::from(path),
            None => self.script.default_stdout(),
        }
    }

    fn stderr_path(&self) -> PathBuf {
        match self.options.get("error").and_then(|v| v.as_str()) {
            Some(path) => PathBuf::from(path),
            None => self.script.default_stderr(),
        }
    }

    /// Captured stdout, available once the job finished. `Ok(None)` when
    /// the job is not finished or the capture file was never written.
    pub async fn stdout(&self) -> Result<Option<String>> {
        self.read_capture(self.stdout_path()).await
    }

    /// Captured stderr, with the same availability rules as [`stdout`].
    ///
    /// [`stdout`]: Job::stdout
    pub async fn stderr(&self) -> Result<Option<String>> {
        self.read_capture(self.stderr_path()).await
    }

    async fn read_capture(&self, path: PathBuf) -> Result<Option<String>> {
        if !self.launched || !self.finished() {
            warn!(job = %self.name, "Output not available before the job finished");
            return Ok(None);
        }
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Collect the task result recorded by the worker entry point.
    ///
    /// Only meaningful for [`WorkItem::Task`] jobs that finished. A failed
    /// task surfaces as [`Error::TaskFailed`]; an unreadable or unparsable
    /// result file as [`Error::NotFound`] or [`Error::ResultCorrupted`].
    pub async fn result(&self) -> Result<serde_json::Value> {
        if !self.launched || !self.finished() {
            return Err(Error::Usage(format!(
                "result of {} requested before the job finished",
                self.name
            )));
        }

        let path = self.script.local_result();
        let raw = tokio::fs::read_to_string(&path).await.map_err(|_| {
            Error::NotFound(format!("result file {} not found", path.display()))
        })?;
        let outcome: TaskOutcome = serde_json::from_str(&raw).map_err(|e| {
            Error::ResultCorrupted(format!("result file {}: {e}", path.display()))
        })?;

        match outcome {
            TaskOutcome::Ok(value) => Ok(value),
            TaskOutcome::Err { message, .. } => Err(Error::TaskFailed(message)),
        }
    }
}
