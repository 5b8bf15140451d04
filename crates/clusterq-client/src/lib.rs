//! Client side of the clusterq batch-queue abstraction.
//!
//! [`ClusterClient`] talks to a backend server (or an in-process backend),
//! hands out [`Job`]s and owns their lifecycle; [`Cluster`] is the
//! composition root binding a client, a backend and a backend name into
//! one session.

pub mod client;
pub mod cluster;
pub mod job;
pub mod proxy;
pub mod session;

pub use client::ClusterClient;
pub use cluster::Cluster;
pub use job::Job;
pub use proxy::{ServerHandle, ServerProxy};
pub use session::Session;
