//! Composition root binding a backend, a client and optionally a daemon.
//!
//! Three ways in: [`Cluster::new`] for an in-process or pre-configured
//! backend, [`Cluster::attach`] for an already-running server, and
//! [`Cluster::serve`] to start a fresh daemon and bind to it.

use std::path::Path;
use tracing::info;

use clusterq_core::{Error, Result};
use clusterq_server::daemon::{self, DaemonHandle};

use crate::client::ClusterClient;
use crate::proxy::ServerProxy;

pub struct Cluster {
    client: ClusterClient,
    backend_name: String,
    daemon: Option<DaemonHandle>,
}

impl std::fmt::Debug for Cluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cluster")
            .field("backend_name", &self.backend_name)
            .field("daemon", &self.daemon)
            .finish_non_exhaustive()
    }
}

impl Cluster {
    /// Bind a registered backend by name. The backend runs in-process for
    /// local work, or against `uri` when one is given.
    pub fn new(
        name: &str,
        local_path: Option<&Path>,
        remote_path: Option<&Path>,
        uri: Option<String>,
    ) -> Result<Self> {
        let backend = clusterq_backends::create_backend(name)?;
        let client = ClusterClient::new(backend, uri, local_path, remote_path);
        Ok(Self {
            client,
            backend_name: name.to_string(),
            daemon: None,
        })
    }

    /// Bind to an already-running server at `uri`. The backend name is
    /// taken from the server itself.
    pub async fn attach(
        uri: &str,
        local_path: Option<&Path>,
        remote_path: Option<&Path>,
    ) -> Result<Self> {
        let proxy = ServerProxy::new(uri)?;
        let name = proxy
            .backend_name()
            .await
            .map_err(|e| Error::ConnectionFailed(format!("cannot reach server at {uri}: {e}")))?;
        info!(uri, backend = %name, "Attached to a running server");
        Self::new(&name, local_path, remote_path, Some(uri.to_string()))
    }

    /// Start a daemon hosting `name` and bind a client to it. Without a
    /// state directory the default one is resolved.
    pub async fn serve(
        name: &str,
        host: &str,
        port: u16,
        state_dir: Option<&Path>,
        local_path: Option<&Path>,
        remote_path: Option<&Path>,
    ) -> Result<Self> {
        // Fail on an unknown backend before spawning anything.
        if !clusterq_backends::is_registered(name) {
            return Err(Error::UnknownBackend(name.to_string()));
        }

        let state_dir = match state_dir {
            Some(dir) => dir.to_path_buf(),
            None => clusterq_core::config::state_dir()?,
        };
        let handle = daemon::start(name, host, port, &state_dir).await?;
        let mut cluster = Self::new(name, local_path, remote_path, Some(handle.uri.clone()))?;
        cluster.daemon = Some(handle);
        Ok(cluster)
    }

    pub fn client(&self) -> &ClusterClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut ClusterClient {
        &mut self.client
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    /// Handle of the daemon this cluster started, if any.
    pub fn daemon(&self) -> Option<&DaemonHandle> {
        self.daemon.as_ref()
    }
}
