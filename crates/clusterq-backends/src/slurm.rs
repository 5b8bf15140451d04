//! Slurm queue backend.
//!
//! Wraps the Slurm command-line tools: `sbatch` for submission, `scancel`
//! for termination, `squeue` for the live queue view and `sacct` for the
//! historical accounting view.

use async_trait::async_trait;
use std::path::Path;
use tracing::{error, info};

use clusterq_core::backend::{MetricsRow, QueueBackend, QueueEntry};
use clusterq_core::options::SubmitOptions;
use clusterq_core::script::ScriptPaths;
use clusterq_core::work::WorkItem;
use clusterq_core::Result;

use crate::runner::{CommandRunner, SystemRunner};
use crate::scriptgen;

const SBATCH: &str = "sbatch";
const SQUEUE: &str = "squeue";
const SCANCEL: &str = "scancel";
const SACCT: &str = "sacct";

/// Accounting fields fetched by `metrics`. Every backend's metrics rows
/// carry exactly this many columns.
pub(crate) const METRICS_FIELDS: &[&str] = &[
    "JobID",
    "Partition",
    "AllocCPUs",
    "AllocNodes",
    "AllocTres",
    "AveCPUFreq",
    "AveDiskRead",
    "AveDiskWrite",
    "AveRSS",
    "ConsumedEnergy",
    "Submit",
    "Start",
    "End",
    "Elapsed",
];

pub struct SlurmBackend {
    runner: Box<dyn CommandRunner>,
}

impl SlurmBackend {
    pub fn new() -> Self {
        Self {
            runner: Box::new(SystemRunner),
        }
    }

    /// Build with a custom command runner (used by tests).
    pub fn with_runner(runner: Box<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl Default for SlurmBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse pipe-delimited `id|status` lines, tolerating a trailing blank
/// line. Statuses are lowercased for the taxonomy.
fn parse_queue_lines(out: &str) -> Vec<QueueEntry> {
    out.lines()
        .filter_map(|line| {
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            let mut fields = line.split('|');
            let id = fields.next()?.trim();
            let status = fields.next()?.trim();
            if id.is_empty() || status.is_empty() {
                return None;
            }
            Some(QueueEntry::new(id, status.to_ascii_lowercase()))
        })
        .collect()
}

/// Merge the live queue view with the accounting view. Live entries win;
/// entries only present in history are appended, not duplicated.
fn merge_views(live: Vec<QueueEntry>, history: Vec<QueueEntry>) -> Vec<QueueEntry> {
    let mut merged = live;
    let live_ids: Vec<String> = merged.iter().map(|e| e.id.clone()).collect();
    for entry in history {
        if !live_ids.contains(&entry.id) {
            merged.push(entry);
        }
    }
    merged
}

/// Extract the job id from sbatch stdout ("Submitted batch job 1234").
/// Array submissions ("1234_5") are reduced to the base id.
fn parse_sbatch_id(stdout: &str) -> Option<String> {
    let token = stdout.split_whitespace().last()?;
    let id = token.split('_').next().unwrap_or(token).trim();
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[async_trait]
impl QueueBackend for SlurmBackend {
    fn name(&self) -> &'static str {
        "slurm"
    }

    async fn submit(&self, script_path: &Path) -> Result<Option<String>> {
        let args = vec![script_path.display().to_string()];
        let out = self.runner.run(SBATCH, &args).await?;
        if !out.success {
            error!(code = ?out.code, stderr = %out.stderr, "sbatch failed");
            return Ok(None);
        }
        Ok(parse_sbatch_id(&out.stdout))
    }

    async fn cancel(&self, job_ids: &[String]) -> Result<bool> {
        let out = self.runner.run(SCANCEL, job_ids).await?;
        Ok(out.success)
    }

    async fn queue(&self, job_id: Option<&str>) -> Result<Vec<QueueEntry>> {
        let mut squeue_args = vec!["-h".to_string(), "-o".to_string(), "%A|%T".to_string()];
        let mut sacct_args = vec![
            "-P".to_string(),
            "--noheader".to_string(),
            "--format=jobid,state".to_string(),
        ];
        if let Some(id) = job_id {
            squeue_args.extend(["-j".to_string(), id.to_string()]);
            sacct_args.extend(["-j".to_string(), id.to_string()]);
        }

        let live = parse_queue_lines(&self.runner.run(SQUEUE, &squeue_args).await?.stdout);
        let history = parse_queue_lines(&self.runner.run(SACCT, &sacct_args).await?.stdout);

        Ok(merge_views(live, history))
    }

    async fn metrics(&self, job_id: Option<&str>) -> Result<Vec<MetricsRow>> {
        info!("Getting job metrics");
        let mut args = vec![
            "-P".to_string(),
            "--noheader".to_string(),
            "--noconvert".to_string(),
            format!("--format={}", METRICS_FIELDS.join(",")),
        ];
        if let Some(id) = job_id {
            args.extend(["-j".to_string(), id.to_string()]);
        }

        let out = match self.runner.run(SACCT, &args).await {
            Ok(out) => out,
            Err(e) => {
                error!(error = %e, "Error running sacct to get the metrics");
                return Ok(Vec::new());
            }
        };
        if !out.success {
            error!(code = ?out.code, "sacct returned non 0");
            return Ok(Vec::new());
        }

        let rows = out
            .stdout
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| line.split('|').map(str::to_string).collect())
            .collect();
        Ok(rows)
    }

    async fn self_test(&self) -> bool {
        for bin in [SBATCH, SQUEUE] {
            if which::which(bin).is_err() {
                error!(binary = %bin, "Cannot find scheduler executable");
                return false;
            }
        }
        true
    }

    fn generate_artifacts(
        &self,
        script: &ScriptPaths,
        options: &SubmitOptions,
        work: &WorkItem,
    ) -> Result<bool> {
        scriptgen::generate(script, options, work)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CmdOutput;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Runner answering from a canned program → output table.
    struct StubRunner {
        outputs: HashMap<&'static str, CmdOutput>,
        calls: Mutex<Vec<String>>,
    }

    impl StubRunner {
        fn new(outputs: HashMap<&'static str, CmdOutput>) -> Self {
            Self {
                outputs,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for StubRunner {
        async fn run(&self, program: &str, args: &[String]) -> std::io::Result<CmdOutput> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{program} {}", args.join(" ")));
            Ok(self.outputs.get(program).cloned().unwrap_or_default())
        }
    }

    fn backend_with(outputs: HashMap<&'static str, CmdOutput>) -> SlurmBackend {
        SlurmBackend::with_runner(Box::new(StubRunner::new(outputs)))
    }

    #[test]
    fn sbatch_id_parsing() {
        assert_eq!(
            parse_sbatch_id("Submitted batch job 4242\n"),
            Some("4242".to_string())
        );
        assert_eq!(parse_sbatch_id("4242_7"), Some("4242".to_string()));
        assert_eq!(parse_sbatch_id(""), None);
    }

    #[test]
    fn queue_lines_tolerate_trailing_blank() {
        let entries = parse_queue_lines("10|RUNNING\n11|PENDING\n\n");
        assert_eq!(
            entries,
            vec![
                QueueEntry::new("10", "running"),
                QueueEntry::new("11", "pending"),
            ]
        );
    }

    #[test]
    fn live_view_wins_over_history() {
        let live = vec![QueueEntry::new("10", "running")];
        let history = vec![
            QueueEntry::new("10", "completed"),
            QueueEntry::new("9", "failed"),
        ];
        let merged = merge_views(live, history);
        assert_eq!(
            merged,
            vec![
                QueueEntry::new("10", "running"),
                QueueEntry::new("9", "failed"),
            ]
        );
    }

    #[tokio::test]
    async fn submit_returns_none_on_nonzero_exit() {
        let backend = backend_with(HashMap::from([(
            SBATCH,
            CmdOutput::failed(1, "Batch job submission failed"),
        )]));
        let id = backend.submit(Path::new("/tmp/x.sbatch")).await.unwrap();
        assert_eq!(id, None);
    }

    #[tokio::test]
    async fn submit_parses_job_id() {
        let backend = backend_with(HashMap::from([(
            SBATCH,
            CmdOutput::ok("Submitted batch job 77\n"),
        )]));
        let id = backend.submit(Path::new("/tmp/x.sbatch")).await.unwrap();
        assert_eq!(id, Some("77".to_string()));
    }

    #[tokio::test]
    async fn queue_merges_squeue_and_sacct() {
        let backend = backend_with(HashMap::from([
            (SQUEUE, CmdOutput::ok("20|RUNNING\n")),
            (SACCT, CmdOutput::ok("20|COMPLETED\n19|FAILED\n")),
        ]));
        let entries = backend.queue(None).await.unwrap();
        assert_eq!(
            entries,
            vec![
                QueueEntry::new("20", "running"),
                QueueEntry::new("19", "failed"),
            ]
        );
    }

    #[tokio::test]
    async fn metrics_degrade_to_empty_on_failure() {
        let backend = backend_with(HashMap::from([(SACCT, CmdOutput::failed(1, "down"))]));
        assert!(backend.metrics(Some("5")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn metrics_rows_are_split_on_pipes() {
        let backend = backend_with(HashMap::from([(
            SACCT,
            CmdOutput::ok("5|debug|4|1|cpu=4|2.60M|0|0|1200K|42|t0|t1|t2|00:10:00\n"),
        )]));
        let rows = backend.metrics(Some("5")).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), METRICS_FIELDS.len());
        assert_eq!(rows[0][0], "5");
    }
}
