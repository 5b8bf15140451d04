//! Core domain types and traits for the clusterq batch-queue abstraction.
//!
//! This crate contains:
//! - The queue-state taxonomy and its classification rules
//! - The `QueueBackend` trait implemented by every queue integration
//! - Work item and submission option types
//! - Submission artifact path layout
//! - RPC wire types shared by server and client
//! - State-directory resolution for daemon identity artifacts

pub mod backend;
pub mod config;
pub mod error;
pub mod options;
pub mod rpc;
pub mod script;
pub mod states;
pub mod work;

pub use backend::{MetricsRow, QueueBackend, QueueEntry};
pub use error::{Error, Result};
pub use work::{TaskOutcome, TaskSpec, WorkItem};
