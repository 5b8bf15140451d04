//! Queue backend implementations.
//!
//! One implementation of [`clusterq_core::QueueBackend`] per queue system:
//! - [`slurm::SlurmBackend`] wraps the Slurm command-line tools
//! - [`local::LocalBackend`] runs jobs synchronously without a scheduler
//!
//! Backends are created through the [`registry`], never constructed from
//! runtime type inspection.

pub mod local;
pub mod registry;
pub mod runner;
pub mod scriptgen;
pub mod slurm;
pub mod task_runner;

pub use local::LocalBackend;
pub use registry::{backend_names, create_backend, is_registered};
pub use slurm::SlurmBackend;
