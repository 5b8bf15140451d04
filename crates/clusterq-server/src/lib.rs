//! RPC server and daemon supervision for clusterq.
//!
//! [`rpc`] exposes a queue backend over HTTP; [`daemon`] turns a backend
//! into a detached, network-reachable process with on-disk identity
//! artifacts.

pub mod daemon;
pub mod rpc;

pub use daemon::{DaemonHandle, IdentityPaths, start};
pub use rpc::{RpcState, router};
