//! Client for one backend server.
//!
//! A [`ClusterClient`] binds a backend handle, a server URI and the two
//! artifact directories, and creates [`Job`]s that share its connection
//! state through a [`Session`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use clusterq_core::backend::MetricsRow;
use clusterq_core::options::SubmitOptions;
use clusterq_core::script::ScriptPaths;
use clusterq_core::work::WorkItem;
use clusterq_core::{Error, QueueBackend, Result};

use crate::job::Job;
use crate::session::{DEFAULT_CONNECT_RETRIES, Session};

pub struct ClusterClient {
    session: Arc<Session>,
    local_path: Option<PathBuf>,
    remote_path: Option<PathBuf>,
    jobs: Vec<Job>,
}

impl ClusterClient {
    /// Bind a backend handle. `remote_path` falls back to `local_path`
    /// when the scheduler node sees the same filesystem.
    pub fn new(
        backend: Arc<dyn QueueBackend>,
        uri: Option<String>,
        local_path: Option<&Path>,
        remote_path: Option<&Path>,
    ) -> Self {
        let local_path = local_path.map(Path::to_path_buf);
        let remote_path = remote_path.map(Path::to_path_buf).or_else(|| local_path.clone());
        Self {
            session: Arc::new(Session::new(backend, uri)),
            local_path,
            remote_path,
            jobs: Vec::new(),
        }
    }

    /// Create a job and take ownership of it. Without a name an opaque
    /// one is generated.
    pub fn new_job(
        &mut self,
        work: WorkItem,
        options: SubmitOptions,
        name: Option<String>,
    ) -> Result<&mut Job> {
        let local = self
            .local_path
            .as_deref()
            .ok_or_else(|| Error::Usage("client has no local artifact directory".into()))?;
        let remote = self
            .remote_path
            .as_deref()
            .ok_or_else(|| Error::Usage("client has no remote artifact directory".into()))?;

        let name = name.unwrap_or_else(|| {
            let tag = Uuid::new_v4().simple().to_string();
            format!("job-{}", &tag[..8])
        });

        let script = ScriptPaths::new(&name, local, remote);
        let job = Job::new(name, work, options, script, self.session.clone());
        let idx = self.jobs.len();
        self.jobs.push(job);
        Ok(&mut self.jobs[idx])
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn jobs_mut(&mut self) -> &mut [Job] {
        &mut self.jobs
    }

    /// The most recently created job.
    pub fn last_job(&self) -> Option<&Job> {
        self.jobs.last()
    }

    pub fn last_job_mut(&mut self) -> Option<&mut Job> {
        self.jobs.last_mut()
    }

    pub fn local_path(&self) -> Option<&Path> {
        self.local_path.as_deref()
    }

    pub fn remote_path(&self) -> Option<&Path> {
        self.remote_path.as_deref()
    }

    pub fn uri(&self) -> Option<String> {
        self.session.uri()
    }

    pub fn set_uri(&self, uri: Option<String>) {
        self.session.set_uri(uri);
    }

    pub fn connected(&self) -> bool {
        self.session.connected()
    }

    /// Establish the server connection eagerly. Returns whether the
    /// server answered.
    pub async fn connect(&self) -> Result<bool> {
        Ok(self.session.connect(DEFAULT_CONNECT_RETRIES).await?.is_some())
    }

    pub fn disconnect(&self) {
        self.session.disconnect();
    }

    pub async fn self_test(&self) -> Result<bool> {
        self.session.self_test().await
    }

    pub async fn metrics(&self, job_id: Option<&str>) -> Result<Vec<MetricsRow>> {
        self.session.metrics(job_id).await
    }

    pub async fn cancel_all(&self) -> Result<bool> {
        let ids: Vec<String> = self
            .jobs
            .iter()
            .filter_map(|j| j.remote_id().map(String::from))
            .collect();
        if ids.is_empty() {
            return Ok(false);
        }
        self.session.cancel(&ids).await
    }

    pub(crate) fn session(&self) -> &Arc<Session> {
        &self.session
    }
}
