// Integration tests for the pool registry lifecycle operations.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use corral::pool::{Job, WorkerPool};
use corral::{ManagedPools, NamedThreadFactory, PoolRegistry, SubmitError, fixed_pool};

/// A pool stand-in that records how the registry drives its lifecycle.
#[derive(Default)]
struct ProbePool {
    shutdowns: AtomicUsize,
    forced: AtomicUsize,
    terminated: AtomicBool,
}

impl ProbePool {
    fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }

    fn forced_count(&self) -> usize {
        self.forced.load(Ordering::SeqCst)
    }
}

impl WorkerPool for ProbePool {
    fn submit_boxed(&self, _job: Job) -> Result<(), SubmitError> {
        if self.is_shutdown() {
            return Err(SubmitError::Shutdown);
        }
        Ok(())
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        self.terminated.store(true, Ordering::SeqCst);
    }

    fn shutdown_now(&self) {
        self.forced.fetch_add(1, Ordering::SeqCst);
        self.terminated.store(true, Ordering::SeqCst);
    }

    fn await_termination(&self, _timeout: Duration) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    fn is_shutdown(&self) -> bool {
        self.shutdowns.load(Ordering::SeqCst) > 0
    }

    fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }
}

#[test]
fn destroy_namespace_terminates_every_pool_and_removes_the_entry() {
    let registry = PoolRegistry::new();
    let pools: Vec<Arc<ProbePool>> = (0..4).map(|_| Arc::new(ProbePool::default())).collect();

    registry.register("svc", "io", pools[0].clone());
    registry.register("svc", "io", pools[1].clone());
    registry.register("svc", "compute", pools[2].clone());
    registry.register("other", "io", pools[3].clone());

    registry.destroy("svc");

    for pool in &pools[..3] {
        assert!(pool.is_terminated());
        assert_eq!(pool.shutdown_count(), 1);
        assert_eq!(pool.forced_count(), 0);
    }
    assert!(!registry.has_namespace("svc"));
    assert!(registry.has_namespace("other"));
    assert!(!pools[3].is_terminated());
}

#[test]
fn destroy_group_terminates_three_pools_and_repeat_is_a_noop() {
    let registry = PoolRegistry::new();
    let pools: Vec<Arc<ProbePool>> = (0..3).map(|_| Arc::new(ProbePool::default())).collect();
    for pool in &pools {
        registry.register("svc", "io", pool.clone());
    }
    assert_eq!(registry.pool_count("svc", "io"), 3);

    registry.destroy_group("svc", "io");

    assert!(!registry.has_group("svc", "io"));
    // the namespace itself survives a group-scoped destroy
    assert!(registry.has_namespace("svc"));
    for pool in &pools {
        assert!(pool.is_terminated());
        assert_eq!(pool.shutdown_count(), 1);
    }

    registry.destroy_group("svc", "io");
    for pool in &pools {
        assert_eq!(pool.shutdown_count(), 1);
    }
}

#[test]
fn deregister_returns_ownership_without_terminating() {
    let registry = PoolRegistry::new();
    let pool = Arc::new(ProbePool::default());
    registry.register("svc", "io", pool.clone());

    registry.deregister("svc", "io");
    registry.destroy("svc");

    assert_eq!(pool.shutdown_count(), 0);
    assert!(!pool.is_terminated());
}

#[test]
fn deregister_pool_removes_only_the_given_handle() {
    let registry = PoolRegistry::new();
    let kept = Arc::new(ProbePool::default());
    let released = Arc::new(ProbePool::default());
    registry.register("svc", "io", kept.clone());
    registry.register("svc", "io", released.clone());

    let handle: Arc<dyn WorkerPool> = released.clone();
    registry.deregister_pool("svc", "io", &handle);
    assert_eq!(registry.pool_count("svc", "io"), 1);

    registry.destroy("svc");
    assert!(kept.is_terminated());
    assert!(!released.is_terminated());
}

#[test]
fn duplicate_registration_stores_the_pool_once() {
    let registry = PoolRegistry::new();
    let pool = Arc::new(ProbePool::default());
    registry.register("svc", "io", pool.clone());
    registry.register("svc", "io", pool.clone());

    assert_eq!(registry.pool_count("svc", "io"), 1);
    registry.destroy("svc");
    assert_eq!(pool.shutdown_count(), 1);
}

#[test]
fn shutdown_is_idempotent() {
    let registry = PoolRegistry::new();
    let first = Arc::new(ProbePool::default());
    registry.register("svc", "io", first.clone());

    registry.shutdown();
    assert_eq!(first.shutdown_count(), 1);
    assert!(!registry.has_namespace("svc"));

    // pools registered after the first shutdown are left alone by later calls
    let second = Arc::new(ProbePool::default());
    registry.register("svc", "io", second.clone());
    registry.shutdown();

    assert_eq!(first.shutdown_count(), 1);
    assert_eq!(second.shutdown_count(), 0);
}

#[test]
fn shutdown_guard_drives_shutdown_on_drop() {
    let registry = Arc::new(PoolRegistry::new());
    let pool = Arc::new(ProbePool::default());
    registry.register("svc", "io", pool.clone());

    {
        let _guard = registry.shutdown_guard();
    }

    assert!(pool.is_terminated());
}

#[test]
fn register_then_deregister_leaves_a_real_pool_running() {
    let registry = PoolRegistry::new();
    let factory = Arc::new(NamedThreadFactory::named("roundtrip").unwrap());
    let pool = Arc::new(fixed_pool(1, factory).unwrap());

    registry.register("svc", "io", pool.clone());
    let handle: Arc<dyn WorkerPool> = pool.clone();
    registry.deregister_pool("svc", "io", &handle);
    registry.destroy("svc");

    // ownership came back to us: the pool still accepts and runs work
    let (tx, rx) = std::sync::mpsc::channel();
    pool.submit(move || {
        tx.send(()).unwrap();
    })
    .unwrap();
    rx.recv_timeout(Duration::from_secs(2)).unwrap();
    assert!(!pool.is_shutdown());

    pool.shutdown();
    assert!(pool.await_termination(Duration::from_secs(2)));
}

#[test]
fn managed_pools_register_under_their_namespace_and_group() {
    let registry = Arc::new(PoolRegistry::new());
    let managed = ManagedPools::with_namespace(registry.clone(), "app");
    let factory = Arc::new(NamedThreadFactory::named("managed").unwrap());

    let pool = managed.fixed("io", 2, factory).unwrap();
    assert_eq!(registry.pool_count("app", "io"), 1);

    registry.destroy("app");
    assert!(pool.is_terminated());
}

#[test]
fn managed_pools_default_namespace() {
    let registry = Arc::new(PoolRegistry::new());
    let managed = ManagedPools::new(registry.clone());
    let factory = Arc::new(NamedThreadFactory::named("managed").unwrap());

    let _pool = managed.single("io", factory).unwrap();
    assert_eq!(registry.pool_count(corral::DEFAULT_NAMESPACE, "io"), 1);
    registry.shutdown();
}
