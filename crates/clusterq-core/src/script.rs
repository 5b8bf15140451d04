//! Submission artifact path layout.
//!
//! Artifacts for a job live in two directories: the local one where the
//! client writes them, and the remote one where the scheduler node reads
//! them. Both may be the same directory.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const BATCH_EXT: &str = "sbatch";
const TASK_EXT: &str = "task.json";
const RESULT_EXT: &str = "result.json";
const STDOUT_EXT: &str = "out";
const STDERR_EXT: &str = "err";

/// Per-job artifact paths, named by job name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptPaths {
    name: String,
    local_dir: PathBuf,
    remote_dir: PathBuf,
}

impl ScriptPaths {
    pub fn new(name: impl Into<String>, local_dir: &Path, remote_dir: &Path) -> Self {
        Self {
            name: name.into(),
            local_dir: local_dir.to_path_buf(),
            remote_dir: remote_dir.to_path_buf(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn remote_dir(&self) -> &Path {
        &self.remote_dir
    }

    fn file(&self, ext: &str) -> String {
        format!("{}.{}", self.name, ext)
    }

    /// The batch submission script, as written by the client.
    pub fn local_batch(&self) -> PathBuf {
        self.local_dir.join(self.file(BATCH_EXT))
    }

    /// The batch submission script, as seen by the scheduler node.
    pub fn remote_batch(&self) -> PathBuf {
        self.remote_dir.join(self.file(BATCH_EXT))
    }

    /// Serialized task payload for the worker entry point.
    pub fn local_task(&self) -> PathBuf {
        self.local_dir.join(self.file(TASK_EXT))
    }

    pub fn remote_task(&self) -> PathBuf {
        self.remote_dir.join(self.file(TASK_EXT))
    }

    /// Result capture file holding the task outcome.
    pub fn local_result(&self) -> PathBuf {
        self.local_dir.join(self.file(RESULT_EXT))
    }

    pub fn remote_result(&self) -> PathBuf {
        self.remote_dir.join(self.file(RESULT_EXT))
    }

    /// Default stdout capture when no `output` directive is given.
    pub fn default_stdout(&self) -> PathBuf {
        self.local_dir.join(self.file(STDOUT_EXT))
    }

    /// Default stderr capture when no `error` directive is given.
    pub fn default_stderr(&self) -> PathBuf {
        self.local_dir.join(self.file(STDERR_EXT))
    }
}
