//! Wire types for the backend RPC surface, shared by server and client.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::backend::{MetricsRow, QueueEntry};

/// Fixed token returned by the `ping` endpoint.
pub const LIVENESS_TOKEN: &str = "pong";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub script_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub job_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueQuery {
    pub job_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueResponse {
    pub entries: Vec<QueueEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub rows: Vec<MetricsRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfTestResponse {
    pub ok: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendResponse {
    pub name: String,
}
