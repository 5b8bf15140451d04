//! Work item types.
//!
//! A job runs either a literal shell command or a task: a named invocation
//! of a stable worker entry point that receives a JSON payload and records
//! a JSON outcome. Executable code never crosses the RPC boundary.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The unit of work carried by a job. Exactly one of the two forms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkItem {
    /// A shell command pasted verbatim into the generated batch script.
    Command(String),
    /// A portable task descriptor executed by `clusterq-worker`.
    Task(TaskSpec),
}

/// Description of a task for the worker entry point.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Program the worker invokes.
    pub program: String,
    /// Command-line arguments for the program.
    pub args: Vec<String>,
    /// Argument payload, written to the program's stdin as JSON.
    pub payload: Value,
}

/// Outcome recorded in the result capture file.
///
/// Serializes as `{"ok": value}` or `{"err": {...}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskOutcome {
    Ok(Value),
    Err {
        message: String,
        exit_code: Option<i32>,
    },
}

impl TaskOutcome {
    pub fn is_err(&self) -> bool {
        matches!(self, TaskOutcome::Err { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn outcome_wire_format() {
        let ok = TaskOutcome::Ok(json!([1, 2, 3]));
        assert_eq!(serde_json::to_value(&ok).unwrap(), json!({"ok": [1, 2, 3]}));

        let err = TaskOutcome::Err {
            message: "boom".into(),
            exit_code: Some(2),
        };
        let v = serde_json::to_value(&err).unwrap();
        assert_eq!(v["err"]["message"], "boom");
        assert_eq!(v["err"]["exit_code"], 2);
    }

    #[test]
    fn task_spec_round_trips() {
        let spec = TaskSpec {
            program: "python3".into(),
            args: vec!["analyze.py".into()],
            payload: json!({"samples": 128}),
        };
        let text = serde_json::to_string(&spec).unwrap();
        let back: TaskSpec = serde_json::from_str(&text).unwrap();
        assert_eq!(back.program, "python3");
        assert_eq!(back.payload["samples"], 128);
    }
}
