//! Batch script rendering shared by the queue backends.

use clusterq_core::options::{DirectiveValue, SubmitOptions};
use clusterq_core::script::ScriptPaths;
use clusterq_core::work::WorkItem;
use clusterq_core::Result;
use tracing::error;

/// Prefix for scheduler directive lines. Harmless bash comments for
/// backends that do not read them.
pub const OPT_PREFIX: &str = "#SBATCH";

/// Stable worker entry point invoked for task work items.
pub const WORKER_BIN: &str = "clusterq-worker";

const STRING_DIRECTIVES: &[(&str, &str)] = &[
    ("jname", "--job-name"),
    ("queue", "--qos"),
    ("workdir", "--workdir"),
    ("error", "--error"),
    ("output", "--output"),
];

const INT_DIRECTIVES: &[(&str, &str)] = &[
    ("nodes", "--nodes"),
    ("ntasks", "--ntasks"),
    ("cpus_per_task", "--cpus-per-task"),
    ("tasks_per_node", "--tasks-per-node"),
];

const BOOL_DIRECTIVES: &[(&str, &str)] = &[("exclusive", "--exclusive")];

/// Render the scheduler directive block. Unknown option keys are ignored.
pub fn render_directives(options: &SubmitOptions) -> String {
    let mut lines = Vec::new();

    for (key, flag) in STRING_DIRECTIVES {
        if let Some(value) = options.get(*key) {
            lines.push(format!("{OPT_PREFIX} {flag}={}", render_value(value)));
        }
    }
    for (key, flag) in INT_DIRECTIVES {
        if let Some(value) = options.get(*key) {
            lines.push(format!("{OPT_PREFIX} {flag}={}", render_value(value)));
        }
    }
    for (key, flag) in BOOL_DIRECTIVES {
        if let Some(value) = options.get(*key) {
            if value.as_flag() == Some(true) {
                lines.push(format!("{OPT_PREFIX} {flag}"));
            }
        }
    }

    lines.join("\n")
}

fn render_value(value: &DirectiveValue) -> String {
    match value {
        DirectiveValue::Str(s) => s.clone(),
        DirectiveValue::Int(i) => i.to_string(),
        DirectiveValue::Flag(b) => b.to_string(),
    }
}

/// The command line placed in the batch script for a work item. Task work
/// is routed through the worker entry point; commands pass verbatim.
pub fn work_command(script: &ScriptPaths, work: &WorkItem) -> String {
    match work {
        WorkItem::Command(cmd) => cmd.clone(),
        WorkItem::Task(_) => format!(
            "{WORKER_BIN} run --task {} --out {}",
            script.remote_task().display(),
            script.remote_result().display()
        ),
    }
}

/// Generate the submission artifacts for a job.
///
/// Writes the batch script and, for task work, the serialized task payload.
/// Returns `Ok(false)` leaving no submittable script behind when the
/// payload cannot be serialized.
pub fn generate(script: &ScriptPaths, options: &SubmitOptions, work: &WorkItem) -> Result<bool> {
    if let WorkItem::Task(task) = work {
        let payload = match serde_json::to_vec_pretty(task) {
            Ok(data) => data,
            Err(e) => {
                error!(error = %e, "Task payload is not serializable");
                return Ok(false);
            }
        };
        std::fs::write(script.local_task(), payload)?;
    }

    let workdir = options
        .get("workdir")
        .and_then(DirectiveValue::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| script.remote_dir().display().to_string());

    let body = format!(
        "#!/bin/bash\n\
         {directives}\n\
         cd {workdir}\n\
         date +'%y-%m-%d-%H:%M:%S'\n\
         echo \"Running {name}\"\n\
         {command}\n\
         exitcode=$?\n\
         echo Done\n\
         echo Code: $exitcode\n\
         date +'%y-%m-%d-%H:%M:%S'\n\
         if [[ $exitcode != 0 ]]; then\n\
         \x20   echo Exited with code: $exitcode >&2\n\
         fi\n\
         exit $exitcode\n",
        directives = render_directives(options),
        workdir = workdir,
        name = script.name(),
        command = work_command(script, work),
    );
    std::fs::write(script.local_batch(), body)?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    fn opts(entries: &[(&str, DirectiveValue)]) -> SubmitOptions {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn renders_typed_directives() {
        let options = opts(&[
            ("jname", "fit".into()),
            ("queue", "debug".into()),
            ("nodes", 2.into()),
            ("exclusive", true.into()),
        ]);
        let block = render_directives(&options);
        assert!(block.contains("#SBATCH --job-name=fit"));
        assert!(block.contains("#SBATCH --qos=debug"));
        assert!(block.contains("#SBATCH --nodes=2"));
        assert!(block.contains("#SBATCH --exclusive"));
    }

    #[test]
    fn exclusive_false_is_omitted() {
        let options = opts(&[("exclusive", false.into())]);
        assert_eq!(render_directives(&options), "");
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let options = opts(&[("gpus_per_node", 4.into()), ("jname", "x".into())]);
        let block = render_directives(&options);
        assert_eq!(block, "#SBATCH --job-name=x");
    }

    #[test]
    fn command_work_passes_verbatim() {
        let script = ScriptPaths::new("j", Path::new("/l"), Path::new("/r"));
        let cmd = work_command(&script, &WorkItem::Command("echo hi".into()));
        assert_eq!(cmd, "echo hi");
    }

    #[test]
    fn task_work_invokes_the_worker() {
        let script = ScriptPaths::new("j", Path::new("/l"), Path::new("/r"));
        let task = WorkItem::Task(clusterq_core::TaskSpec {
            program: "python3".into(),
            args: vec![],
            payload: json!(null),
        });
        let cmd = work_command(&script, &task);
        assert_eq!(
            cmd,
            "clusterq-worker run --task /r/j.task.json --out /r/j.result.json"
        );
    }

    #[test]
    fn generate_writes_script_and_task_payload() {
        let tmp = tempfile::tempdir().unwrap();
        let script = ScriptPaths::new("gen", tmp.path(), tmp.path());
        let task = WorkItem::Task(clusterq_core::TaskSpec {
            program: "cat".into(),
            args: vec![],
            payload: json!({"n": 1}),
        });
        let ok = generate(&script, &SubmitOptions::new(), &task).unwrap();
        assert!(ok);
        assert!(script.local_batch().is_file());
        assert!(script.local_task().is_file());
        let body = std::fs::read_to_string(script.local_batch()).unwrap();
        assert!(body.starts_with("#!/bin/bash"));
        assert!(body.contains("clusterq-worker run"));
    }
}
