//! Distributed object cluster connectivity.
//!
//! The distributed-object backend stores blocks as objects in one pool of an
//! object cluster. The cluster's wire client lives outside this crate and is
//! plugged in through [`ClusterConnector`]; [`MemoryCluster`] provides an
//! in-process cluster for tests and embedding.

use crate::memory::InMemoryObjectStore;
use crate::object::{ObjectClient, ObjectResult};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Name of the distributed-object variant in configuration and diagnostics.
pub const DISTRIBUTED_OBJECT_BACKEND: &str = "distributed-object";

/// Connects to a pool of a distributed object cluster.
pub trait ClusterConnector: Send + Sync {
    /// Returns a client bound to `pool`, using the cluster described by
    /// `cluster_config`.
    ///
    /// The returned client is shared by every handle of the backend and
    /// must be safe for concurrent use.
    fn connect(&self, cluster_config: &str, pool: &str) -> ObjectResult<Arc<dyn ObjectClient>>;
}

/// An in-process cluster whose pools are [`InMemoryObjectStore`]s.
///
/// Connecting twice to the same pool name yields the same store, so several
/// backends can observe each other's blocks like clients of one real cluster.
#[derive(Debug, Default)]
pub struct MemoryCluster {
    pools: RwLock<HashMap<String, Arc<InMemoryObjectStore>>>,
}

impl MemoryCluster {
    /// Creates a cluster with no pools.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the named pool, creating it if needed.
    pub fn pool(&self, name: &str) -> Arc<InMemoryObjectStore> {
        if let Some(pool) = self.pools.read().get(name) {
            return Arc::clone(pool);
        }
        let mut pools = self.pools.write();
        Arc::clone(pools.entry(name.to_string()).or_default())
    }

    /// Returns the sorted names of all pools.
    #[must_use]
    pub fn pool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.pools.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl ClusterConnector for MemoryCluster {
    fn connect(&self, cluster_config: &str, pool: &str) -> ObjectResult<Arc<dyn ObjectClient>> {
        debug!(cluster_config, pool, "connecting to in-memory cluster pool");
        Ok(self.pool(pool))
    }
}
