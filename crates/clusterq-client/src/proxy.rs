//! Typed proxy for the backend RPC surface.

use std::path::Path;
use std::sync::Arc;
use url::Url;

use clusterq_core::backend::{MetricsRow, QueueEntry};
use clusterq_core::rpc::{
    BackendResponse, CancelRequest, CancelResponse, MetricsResponse, PingResponse, QueueResponse,
    SelfTestResponse, SubmitRequest, SubmitResponse,
};
use clusterq_core::{Error, QueueBackend, Result};

/// HTTP proxy to a remote backend server.
#[derive(Clone, Debug)]
pub struct ServerProxy {
    base: Url,
    http: reqwest::Client,
}

fn transport(e: reqwest::Error) -> Error {
    Error::Transport(e.to_string())
}

impl ServerProxy {
    pub fn new(uri: &str) -> Result<Self> {
        let base = Url::parse(uri).map_err(|e| Error::Usage(format!("invalid server URI {uri}: {e}")))?;
        Ok(Self {
            base,
            http: reqwest::Client::new(),
        })
    }

    pub fn uri(&self) -> &str {
        self.base.as_str()
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| Error::Internal(format!("building endpoint {path}: {e}")))
    }

    pub async fn ping(&self) -> Result<String> {
        let url = self.endpoint("ping")?;
        let response: PingResponse = self
            .http
            .get(url)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(response.token)
    }

    pub async fn backend_name(&self) -> Result<String> {
        let url = self.endpoint("backend")?;
        let response: BackendResponse = self
            .http
            .get(url)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(response.name)
    }

    pub async fn submit(&self, script_path: &Path) -> Result<Option<String>> {
        let url = self.endpoint("submit")?;
        let request = SubmitRequest {
            script_path: script_path.to_path_buf(),
        };
        let response: SubmitResponse = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(response.job_id)
    }

    pub async fn cancel(&self, job_ids: &[String]) -> Result<bool> {
        let url = self.endpoint("cancel")?;
        let request = CancelRequest {
            job_ids: job_ids.to_vec(),
        };
        let response: CancelResponse = self
            .http
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(response.ok)
    }

    pub async fn queue(&self, job_id: Option<&str>) -> Result<Vec<QueueEntry>> {
        let url = self.endpoint("queue")?;
        let mut request = self.http.get(url);
        if let Some(id) = job_id {
            request = request.query(&[("job_id", id)]);
        }
        let response: QueueResponse = request
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(response.entries)
    }

    pub async fn metrics(&self, job_id: Option<&str>) -> Result<Vec<MetricsRow>> {
        let url = self.endpoint("metrics")?;
        let mut request = self.http.get(url);
        if let Some(id) = job_id {
            request = request.query(&[("job_id", id)]);
        }
        let response: MetricsResponse = request
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(response.rows)
    }

    pub async fn self_test(&self) -> Result<bool> {
        let url = self.endpoint("selftest")?;
        let response: SelfTestResponse = self
            .http
            .get(url)
            .send()
            .await
            .map_err(transport)?
            .json()
            .await
            .map_err(transport)?;
        Ok(response.ok)
    }

    pub async fn shutdown(&self) -> Result<()> {
        let url = self.endpoint("shutdown")?;
        self.http.post(url).send().await.map_err(transport)?;
        Ok(())
    }
}

/// An established channel to a backend: either a remote daemon or an
/// in-process backend instance (local runner).
#[derive(Clone)]
pub enum ServerHandle {
    Remote(ServerProxy),
    Direct(Arc<dyn QueueBackend>),
}

impl std::fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerHandle::Remote(proxy) => f.debug_tuple("Remote").field(proxy).finish(),
            ServerHandle::Direct(backend) => f.debug_tuple("Direct").field(&backend.name()).finish(),
        }
    }
}

impl ServerHandle {
    pub async fn ping(&self) -> Result<String> {
        match self {
            ServerHandle::Remote(proxy) => proxy.ping().await,
            ServerHandle::Direct(_) => Ok(clusterq_core::rpc::LIVENESS_TOKEN.to_string()),
        }
    }

    pub async fn backend_name(&self) -> Result<String> {
        match self {
            ServerHandle::Remote(proxy) => proxy.backend_name().await,
            ServerHandle::Direct(backend) => Ok(backend.name().to_string()),
        }
    }

    pub async fn submit(&self, script_path: &Path) -> Result<Option<String>> {
        match self {
            ServerHandle::Remote(proxy) => proxy.submit(script_path).await,
            ServerHandle::Direct(backend) => backend.submit(script_path).await,
        }
    }

    pub async fn cancel(&self, job_ids: &[String]) -> Result<bool> {
        match self {
            ServerHandle::Remote(proxy) => proxy.cancel(job_ids).await,
            ServerHandle::Direct(backend) => backend.cancel(job_ids).await,
        }
    }

    pub async fn queue(&self, job_id: Option<&str>) -> Result<Vec<QueueEntry>> {
        match self {
            ServerHandle::Remote(proxy) => proxy.queue(job_id).await,
            ServerHandle::Direct(backend) => backend.queue(job_id).await,
        }
    }

    pub async fn metrics(&self, job_id: Option<&str>) -> Result<Vec<MetricsRow>> {
        match self {
            ServerHandle::Remote(proxy) => proxy.metrics(job_id).await,
            ServerHandle::Direct(backend) => backend.metrics(job_id).await,
        }
    }

    pub async fn self_test(&self) -> Result<bool> {
        match self {
            ServerHandle::Remote(proxy) => proxy.self_test().await,
            ServerHandle::Direct(backend) => Ok(backend.self_test().await),
        }
    }
}
