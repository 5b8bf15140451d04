//! Connection state shared between a client and its jobs.
//!
//! A [`Session`] owns the backend handle and the server URI, lazily
//! establishes a [`ServerHandle`] on first use, and retries transient
//! transport failures on the operations jobs depend on.

use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use clusterq_core::backend::{MetricsRow, QueueEntry};
use clusterq_core::{Error, QueueBackend, Result};

use crate::proxy::{ServerHandle, ServerProxy};

/// Ping attempts beyond the first when establishing a connection.
pub const DEFAULT_CONNECT_RETRIES: u32 = 3;
/// Pause between connection attempts.
const CONNECT_COOLDOWN: Duration = Duration::from_millis(500);
/// Pause before retrying an operation after a transport failure.
const RECONNECT_PAUSE: Duration = Duration::from_millis(500);
/// Transport failures tolerated per operation before giving up.
const RECONNECT_BUDGET: u32 = 2;

/// Backend plus connection state. Jobs hold an `Arc<Session>` so they can
/// reach the server their client is bound to without owning the client.
pub struct Session {
    backend: Arc<dyn QueueBackend>,
    uri: Mutex<Option<String>>,
    handle: Mutex<Option<ServerHandle>>,
}

impl Session {
    pub fn new(backend: Arc<dyn QueueBackend>, uri: Option<String>) -> Self {
        Self {
            backend,
            uri: Mutex::new(uri),
            handle: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &Arc<dyn QueueBackend> {
        &self.backend
    }

    pub fn uri(&self) -> Option<String> {
        self.uri.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn set_uri(&self, uri: Option<String>) {
        *self.uri.lock().unwrap_or_else(|e| e.into_inner()) = uri;
        // A new URI invalidates whatever channel was established.
        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    pub fn connected(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }

    fn cached_handle(&self) -> Option<ServerHandle> {
        self.handle
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn store_handle(&self, handle: Option<ServerHandle>) {
        *self.handle.lock().unwrap_or_else(|e| e.into_inner()) = handle;
    }

    /// Try to establish a handle, pinging up to `retries + 1` times.
    /// Returns `Ok(None)` when every attempt failed.
    ///
    /// A configured URI always wins, even for in-process backends: a
    /// session bound to a served daemon must talk to that daemon.
    pub async fn connect(&self, retries: u32) -> Result<Option<ServerHandle>> {
        let uri = match self.uri() {
            Some(uri) => uri,
            None if self.backend.in_process() => {
                let handle = ServerHandle::Direct(self.backend.clone());
                self.store_handle(Some(handle.clone()));
                return Ok(Some(handle));
            }
            None => {
                return Err(Error::Usage(
                    "no server URI configured for a remote backend".into(),
                ));
            }
        };
        let proxy = ServerProxy::new(&uri)?;

        for attempt in 1..=retries + 1 {
            match proxy.ping().await {
                Ok(_) => {
                    info!(uri = %uri, "Server is reachable");
                    let handle = ServerHandle::Remote(proxy);
                    self.store_handle(Some(handle.clone()));
                    return Ok(Some(handle));
                }
                Err(e) => {
                    warn!(uri = %uri, attempt, retries, error = %e, "Can not bind server");
                    if attempt <= retries {
                        tokio::time::sleep(CONNECT_COOLDOWN).await;
                    }
                }
            }
        }
        Ok(None)
    }

    /// The established handle, connecting first if needed.
    pub async fn server(&self) -> Result<ServerHandle> {
        if let Some(handle) = self.cached_handle() {
            return Ok(handle);
        }
        match self.connect(DEFAULT_CONNECT_RETRIES).await? {
            Some(handle) => Ok(handle),
            None => Err(Error::ConnectionFailed(format!(
                "server at {} did not answer",
                self.uri().unwrap_or_default()
            ))),
        }
    }

    /// Drop the established handle, if any.
    pub fn disconnect(&self) {
        let mut guard = self.handle.lock().unwrap_or_else(|e| e.into_inner());
        if guard.take().is_none() {
            info!("Not connected, nothing to do");
        }
    }

    /// Run an operation through the server, dropping the handle and
    /// retrying on transport failures until the budget runs out.
    async fn with_reconnect<T, F, Fut>(&self, what: &str, op: F) -> Result<T>
    where
        F: Fn(ServerHandle) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut budget = RECONNECT_BUDGET;
        loop {
            let handle = self.server().await?;
            match op(handle).await {
                Ok(value) => return Ok(value),
                Err(Error::Transport(e)) if budget > 0 => {
                    warn!(error = %e, operation = what, "Call failed in transit, reconnecting");
                    self.disconnect();
                    budget -= 1;
                    tokio::time::sleep(RECONNECT_PAUSE).await;
                }
                Err(Error::Transport(e)) => {
                    return Err(Error::ConnectionFailed(format!(
                        "{what} kept failing in transit: {e}"
                    )));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Submit through the server, reconnecting on transport failures.
    pub async fn submit(&self, script_path: &Path) -> Result<Option<String>> {
        self.with_reconnect("submission", |handle| async move {
            handle.submit(script_path).await
        })
        .await
    }

    /// Query the queue through the server, reconnecting on transport
    /// failures.
    pub async fn queue(&self, job_id: Option<&str>) -> Result<Vec<QueueEntry>> {
        self.with_reconnect("queue query", |handle| async move {
            handle.queue(job_id).await
        })
        .await
    }

    pub async fn cancel(&self, job_ids: &[String]) -> Result<bool> {
        self.server().await?.cancel(job_ids).await
    }

    pub async fn metrics(&self, job_id: Option<&str>) -> Result<Vec<MetricsRow>> {
        self.server().await?.metrics(job_id).await
    }

    pub async fn self_test(&self) -> Result<bool> {
        self.server().await?.self_test().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clusterq_core::backend::QueueBackend;
    use clusterq_core::options::SubmitOptions;
    use clusterq_core::script::ScriptPaths;
    use clusterq_core::work::WorkItem;

    struct InProcess;

    #[async_trait]
    impl QueueBackend for InProcess {
        fn name(&self) -> &'static str {
            "inproc"
        }
        async fn submit(&self, _script_path: &Path) -> Result<Option<String>> {
            Ok(Some("7".into()))
        }
        async fn cancel(&self, _job_ids: &[String]) -> Result<bool> {
            Ok(true)
        }
        async fn queue(&self, _job_id: Option<&str>) -> Result<Vec<QueueEntry>> {
            Ok(vec![QueueEntry::new("7", "running")])
        }
        async fn metrics(&self, _job_id: Option<&str>) -> Result<Vec<MetricsRow>> {
            Ok(vec![])
        }
        async fn self_test(&self) -> bool {
            true
        }
        fn generate_artifacts(
            &self,
            _script: &ScriptPaths,
            _options: &SubmitOptions,
            _work: &WorkItem,
        ) -> Result<bool> {
            Ok(true)
        }
        fn in_process(&self) -> bool {
            true
        }
    }

    #[tokio::test]
    async fn in_process_backend_connects_without_a_uri() {
        let session = Session::new(Arc::new(InProcess), None);
        assert!(!session.connected());
        let handle = session.connect(0).await.unwrap();
        assert!(handle.is_some());
        assert!(session.connected());
        assert_eq!(session.queue(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn remote_backend_without_uri_is_a_usage_error() {
        struct Remote;

        #[async_trait]
        impl QueueBackend for Remote {
            fn name(&self) -> &'static str {
                "remote"
            }
            async fn submit(&self, _script_path: &Path) -> Result<Option<String>> {
                Ok(None)
            }
            async fn cancel(&self, _job_ids: &[String]) -> Result<bool> {
                Ok(false)
            }
            async fn queue(&self, _job_id: Option<&str>) -> Result<Vec<QueueEntry>> {
                Ok(vec![])
            }
            async fn metrics(&self, _job_id: Option<&str>) -> Result<Vec<MetricsRow>> {
                Ok(vec![])
            }
            async fn self_test(&self) -> bool {
                false
            }
            fn generate_artifacts(
                &self,
                _script: &ScriptPaths,
                _options: &SubmitOptions,
                _work: &WorkItem,
            ) -> Result<bool> {
                Ok(true)
            }
        }

        let session = Session::new(Arc::new(Remote), None);
        let err = session.connect(0).await.unwrap_err();
        assert!(matches!(err, Error::Usage(_)));
    }

    #[tokio::test]
    async fn transport_failures_exhaust_the_reconnect_budget() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        struct Flaky {
            calls: AtomicUsize,
        }

        #[async_trait]
        impl QueueBackend for Flaky {
            fn name(&self) -> &'static str {
                "flaky"
            }
            async fn submit(&self, _script_path: &Path) -> Result<Option<String>> {
                Ok(None)
            }
            async fn cancel(&self, _job_ids: &[String]) -> Result<bool> {
                Ok(false)
            }
            async fn queue(&self, _job_id: Option<&str>) -> Result<Vec<QueueEntry>> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Transport("connection closed".into()))
            }
            async fn metrics(&self, _job_id: Option<&str>) -> Result<Vec<MetricsRow>> {
                Ok(vec![])
            }
            async fn self_test(&self) -> bool {
                false
            }
            fn generate_artifacts(
                &self,
                _script: &ScriptPaths,
                _options: &SubmitOptions,
                _work: &WorkItem,
            ) -> Result<bool> {
                Ok(true)
            }
            fn in_process(&self) -> bool {
                true
            }
        }

        let backend = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
        });
        let session = Session::new(backend.clone(), None);
        let err = session.queue(None).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionFailed(_)));
        // One initial call plus one per budget unit.
        assert_eq!(
            backend.calls.load(Ordering::SeqCst),
            RECONNECT_BUDGET as usize + 1
        );
    }

    #[tokio::test]
    async fn configured_uri_overrides_direct_dispatch() {
        // Bound to a (dead) server address, an in-process backend must go
        // through the wire, not short-circuit to itself.
        let session = Session::new(Arc::new(InProcess), Some("http://127.0.0.1:1".into()));
        let handle = session.connect(0).await.unwrap();
        assert!(handle.is_none());
        assert!(!session.connected());
    }

    #[tokio::test]
    async fn disconnect_is_a_no_op_when_not_connected() {
        let session = Session::new(Arc::new(InProcess), None);
        session.disconnect();
        assert!(!session.connected());
    }

    #[tokio::test]
    async fn set_uri_drops_the_established_handle() {
        let session = Session::new(Arc::new(InProcess), None);
        session.connect(0).await.unwrap();
        assert!(session.connected());
        session.set_uri(Some("http://127.0.0.1:9999".into()));
        assert!(!session.connected());
    }
}
