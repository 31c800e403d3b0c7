//! Pool constructors, plus managed variants that register what they build.

use std::sync::Arc;
use std::time::Duration;

use crate::error::BuildError;
use crate::factory::NamedThreadFactory;
use crate::pool::{PoolConfig, ThreadPool, WorkerPool};
use crate::registry::PoolRegistry;
use crate::scheduled::ScheduledThreadPool;

/// Namespace managed constructors register under unless told otherwise.
pub const DEFAULT_NAMESPACE: &str = "corral";

/// Pool with a single worker and an unbounded queue.
pub fn single_pool(factory: Arc<NamedThreadFactory>) -> Result<ThreadPool, BuildError> {
    ThreadPool::new(
        PoolConfig {
            core: 1,
            max: 1,
            keep_alive: None,
            queue_capacity: None,
        },
        factory,
    )
}

/// Pool with a fixed number of workers and an unbounded queue.
pub fn fixed_pool(
    workers: usize,
    factory: Arc<NamedThreadFactory>,
) -> Result<ThreadPool, BuildError> {
    ThreadPool::new(
        PoolConfig {
            core: workers,
            max: workers,
            keep_alive: None,
            queue_capacity: None,
        },
        factory,
    )
}

/// Pool that also runs delayed and repeating jobs.
pub fn scheduled_pool(
    workers: usize,
    factory: Arc<NamedThreadFactory>,
) -> Result<ScheduledThreadPool, BuildError> {
    ScheduledThreadPool::new(workers, factory)
}

/// Pool with a bounded queue that grows from `core` up to `max` workers
/// under load; surplus workers retire after `keep_alive` of idleness.
pub fn custom_pool(
    core: usize,
    max: usize,
    keep_alive: Duration,
    queue_capacity: usize,
    factory: Arc<NamedThreadFactory>,
) -> Result<ThreadPool, BuildError> {
    ThreadPool::new(
        PoolConfig {
            core,
            max,
            keep_alive: Some(keep_alive),
            queue_capacity: Some(queue_capacity),
        },
        factory,
    )
}

/// Constructors that register every pool they build, saving callers the
/// manual `register` call.
pub struct ManagedPools {
    registry: Arc<PoolRegistry>,
    namespace: String,
}

impl ManagedPools {
    /// Managed constructors registering under [`DEFAULT_NAMESPACE`].
    pub fn new(registry: Arc<PoolRegistry>) -> Self {
        Self::with_namespace(registry, DEFAULT_NAMESPACE)
    }

    /// Managed constructors registering under a caller-chosen namespace.
    pub fn with_namespace(registry: Arc<PoolRegistry>, namespace: impl Into<String>) -> Self {
        Self {
            registry,
            namespace: namespace.into(),
        }
    }

    pub fn registry(&self) -> &Arc<PoolRegistry> {
        &self.registry
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn single(
        &self,
        group: &str,
        factory: Arc<NamedThreadFactory>,
    ) -> Result<Arc<ThreadPool>, BuildError> {
        let pool = Arc::new(single_pool(factory)?);
        self.track(group, Arc::clone(&pool) as Arc<dyn WorkerPool>);
        Ok(pool)
    }

    pub fn fixed(
        &self,
        group: &str,
        workers: usize,
        factory: Arc<NamedThreadFactory>,
    ) -> Result<Arc<ThreadPool>, BuildError> {
        let pool = Arc::new(fixed_pool(workers, factory)?);
        self.track(group, Arc::clone(&pool) as Arc<dyn WorkerPool>);
        Ok(pool)
    }

    pub fn scheduled(
        &self,
        group: &str,
        workers: usize,
        factory: Arc<NamedThreadFactory>,
    ) -> Result<Arc<ScheduledThreadPool>, BuildError> {
        let pool = Arc::new(scheduled_pool(workers, factory)?);
        self.track(group, Arc::clone(&pool) as Arc<dyn WorkerPool>);
        Ok(pool)
    }

    pub fn custom(
        &self,
        group: &str,
        core: usize,
        max: usize,
        keep_alive: Duration,
        queue_capacity: usize,
        factory: Arc<NamedThreadFactory>,
    ) -> Result<Arc<ThreadPool>, BuildError> {
        let pool = Arc::new(custom_pool(core, max, keep_alive, queue_capacity, factory)?);
        self.track(group, Arc::clone(&pool) as Arc<dyn WorkerPool>);
        Ok(pool)
    }

    fn track(&self, group: &str, pool: Arc<dyn WorkerPool>) {
        self.registry.register(&self.namespace, group, pool);
    }
}

impl std::fmt::Debug for ManagedPools {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedPools")
            .field("namespace", &self.namespace)
            .field("registry", &self.registry)
            .finish()
    }
}
