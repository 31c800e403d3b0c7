//! # Pool Registry Module
//!
//! Process-wide tracking of long-lived worker pools, grouped by namespace
//! and group, with coordinated graceful destruction.
//!
//! ## Key Concepts
//! - Two-level tree: `namespace -> group -> pools`; levels are created
//!   lazily on first registration
//! - Ownership: registering hands termination authority to the registry;
//!   deregistering returns it to the caller without shutting anything down
//! - One registry per process by convention: the composition root creates
//!   it, shares it, and holds the [`ShutdownGuard`] for the life of the
//!   process
//!
//! ## Thread Safety
//! Every mutation goes through the map's per-namespace entry locking, so
//! operations on different namespaces never block each other. No ordering
//! is promised between a `register` and a `destroy` racing on the same
//! namespace; callers must not assume a racing registration survives.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::pool::WorkerPool;
use crate::shutdown::terminate;

type PoolHandle = Arc<dyn WorkerPool>;
type Groups = HashMap<String, Vec<PoolHandle>>;

/// Registry of worker pools keyed by namespace and group.
pub struct PoolRegistry {
    namespaces: DashMap<String, Groups>,
    closed: AtomicBool,
}

impl PoolRegistry {
    pub fn new() -> Self {
        Self {
            namespaces: DashMap::new(),
            closed: AtomicBool::new(false),
        }
    }

    /// Track `pool` under `(namespace, group)`, creating intermediate levels
    /// as needed. Registering the same pool twice stores it once.
    pub fn register(&self, namespace: &str, group: &str, pool: PoolHandle) {
        let mut groups = self.namespaces.entry(namespace.to_string()).or_default();
        let pools = groups.entry(group.to_string()).or_default();
        if !pools.iter().any(|tracked| Arc::ptr_eq(tracked, &pool)) {
            pools.push(pool);
        }
    }

    /// Stop tracking every pool under `(namespace, group)` without shutting
    /// any of them down; termination responsibility returns to the caller.
    /// No-op if absent.
    pub fn deregister(&self, namespace: &str, group: &str) {
        if let Some(mut groups) = self.namespaces.get_mut(namespace) {
            groups.remove(group);
        }
    }

    /// Stop tracking a single pool, identified by handle identity, without
    /// shutting it down. No-op if absent.
    pub fn deregister_pool(&self, namespace: &str, group: &str, pool: &PoolHandle) {
        if let Some(mut groups) = self.namespaces.get_mut(namespace) {
            if let Some(pools) = groups.get_mut(group) {
                pools.retain(|tracked| !Arc::ptr_eq(tracked, pool));
            }
        }
    }

    /// Terminate every pool under `namespace` and remove the namespace from
    /// the tree.
    pub fn destroy(&self, namespace: &str) {
        if let Some((_, groups)) = self.namespaces.remove(namespace) {
            for (group, pools) in groups {
                debug!(namespace, group, pools = pools.len(), "destroying pool group");
                for pool in pools {
                    terminate(pool.as_ref());
                }
            }
        }
    }

    /// Terminate every pool under `(namespace, group)` and remove the group.
    /// The namespace entry is retained even when it holds no groups anymore.
    pub fn destroy_group(&self, namespace: &str, group: &str) {
        if let Some(mut groups) = self.namespaces.get_mut(namespace) {
            if let Some(pools) = groups.remove(group) {
                debug!(namespace, group, pools = pools.len(), "destroying pool group");
                for pool in pools {
                    terminate(pool.as_ref());
                }
            }
        }
    }

    /// Destroy every namespace currently present. Idempotent: only the
    /// first call acts, any later call is a no-op.
    pub fn shutdown(&self) {
        if self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        warn!("pool registry shutdown: destroying all tracked pools");
        let namespaces: Vec<String> = self
            .namespaces
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for namespace in namespaces {
            self.destroy(&namespace);
        }
        warn!("pool registry shutdown complete");
    }

    /// Guard that runs [`shutdown`](Self::shutdown) when dropped. The host
    /// application's composition root holds this for the life of the
    /// process in place of a language-level exit hook.
    pub fn shutdown_guard(self: &Arc<Self>) -> ShutdownGuard {
        ShutdownGuard {
            registry: Arc::clone(self),
        }
    }

    /// Names of the namespaces currently tracked.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }

    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    pub fn has_group(&self, namespace: &str, group: &str) -> bool {
        self.namespaces
            .get(namespace)
            .is_some_and(|groups| groups.contains_key(group))
    }

    /// Number of pools tracked under `(namespace, group)`.
    pub fn pool_count(&self, namespace: &str, group: &str) -> usize {
        self.namespaces
            .get(namespace)
            .and_then(|groups| groups.get(group).map(Vec::len))
            .unwrap_or(0)
    }
}

impl Default for PoolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PoolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRegistry")
            .field("namespaces", &self.namespaces.len())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

/// Shuts the registry down when dropped.
#[must_use = "the registry shuts down when the guard is dropped"]
pub struct ShutdownGuard {
    registry: Arc<PoolRegistry>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.registry.shutdown();
    }
}

impl fmt::Debug for ShutdownGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownGuard")
            .field("registry", &self.registry)
            .finish()
    }
}
