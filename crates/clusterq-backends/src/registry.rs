//! Backend registry.
//!
//! A process-wide immutable map from backend name to factory, initialized
//! once and injected into the composition root. Unknown names are a
//! construction-time error.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use clusterq_core::{Error, QueueBackend, Result};

use crate::local::LocalBackend;
use crate::slurm::SlurmBackend;

type Factory = fn() -> Arc<dyn QueueBackend>;

fn make_slurm() -> Arc<dyn QueueBackend> {
    Arc::new(SlurmBackend::new())
}

fn make_local() -> Arc<dyn QueueBackend> {
    Arc::new(LocalBackend::new())
}

fn registry() -> &'static BTreeMap<&'static str, Factory> {
    static REGISTRY: OnceLock<BTreeMap<&'static str, Factory>> = OnceLock::new();
    REGISTRY.get_or_init(|| {
        BTreeMap::from([
            ("slurm", make_slurm as Factory),
            ("local", make_local as Factory),
        ])
    })
}

/// Names of all registered backends.
pub fn backend_names() -> Vec<&'static str> {
    registry().keys().copied().collect()
}

pub fn is_registered(name: &str) -> bool {
    registry().contains_key(name)
}

/// Instantiate the backend registered under `name`.
pub fn create_backend(name: &str) -> Result<Arc<dyn QueueBackend>> {
    registry()
        .get(name)
        .map(|factory| factory())
        .ok_or_else(|| Error::UnknownBackend(name.to_string()))
}
