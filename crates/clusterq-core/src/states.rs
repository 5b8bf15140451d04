//! Queue state taxonomy.
//!
//! Every status string a backend can report belongs to exactly one of four
//! disjoint sets. A string outside all four is a contract violation and is
//! surfaced as [`Error::UnmappedState`], never treated as active or done.

use crate::error::{Error, Result};

/// Status of a job that has never been submitted. Reserved; distinct from
/// every real backend status.
pub const INIT_STATUS: &str = "clusterq_init";

/// Successful terminal states.
pub const GOOD_STATES: &[&str] = &["complete", "completed", "special_exit"];

/// States of a job still progressing through the queue.
pub const ACTIVE_STATES: &[&str] = &[
    "configuring",
    "completing",
    "pending",
    "held",
    "running",
    "submitted",
];

/// Failed terminal states.
pub const BAD_STATES: &[&str] = &[
    "boot_fail",
    "cancelled",
    "failed",
    "killed",
    "node_fail",
    "timeout",
    "disappeared",
];

/// Transient backend-specific states that are neither active nor done.
pub const UNCERTAIN_STATES: &[&str] = &["preempted", "stopped", "suspended"];

/// Category of a classified queue status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    Good,
    Active,
    Bad,
    Uncertain,
}

impl StateClass {
    pub fn is_done(self) -> bool {
        matches!(self, StateClass::Good | StateClass::Bad)
    }
}

/// Classify a backend status string. Matching is case-insensitive.
pub fn classify(status: &str) -> Result<StateClass> {
    let s = status.to_ascii_lowercase();
    let s = s.as_str();
    if GOOD_STATES.contains(&s) {
        Ok(StateClass::Good)
    } else if ACTIVE_STATES.contains(&s) {
        Ok(StateClass::Active)
    } else if BAD_STATES.contains(&s) {
        Ok(StateClass::Bad)
    } else if UNCERTAIN_STATES.contains(&s) {
        Ok(StateClass::Uncertain)
    } else {
        Err(Error::UnmappedState(status.to_string()))
    }
}

/// True for any terminal status, good or bad.
pub fn is_done(status: &str) -> bool {
    matches!(classify(status), Ok(c) if c.is_done())
}

/// True for any status still progressing through the queue.
pub fn is_active(status: &str) -> bool {
    matches!(classify(status), Ok(StateClass::Active))
}
