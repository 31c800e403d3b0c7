//! # Worker Pool Module
//!
//! OS-thread worker pools draining a shared job queue. A pool owns `core`
//! permanent workers and, when configured with a bounded queue, grows up to
//! `max` workers on demand; surplus workers retire after `keep_alive` of
//! idleness.
//!
//! ## Key Concepts
//! - Job transport: a flume channel; dropping the sender closes the pool to
//!   new work while queued jobs still drain
//! - Forced shutdown: discards queued jobs; a job already running cannot be
//!   pre-empted and finishes
//! - Termination tracking: a live-worker count under a mutex, signalled
//!   through a condvar for bounded waiting

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender, TrySendError};
use tracing::{debug, warn};

use crate::error::{BuildError, SubmitError};
use crate::factory::NamedThreadFactory;

/// A unit of work accepted by a worker pool.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// A task-execution resource that can accept work and be shut down.
///
/// This is the seam the [registry](crate::registry::PoolRegistry) tracks
/// pools through; by convention the registry becomes the sole terminator of
/// every pool handed to it.
pub trait WorkerPool: Send + Sync {
    /// Submit a boxed job.
    fn submit_boxed(&self, job: Job) -> Result<(), SubmitError>;

    /// Stop accepting new work. Jobs already queued still run.
    fn shutdown(&self);

    /// Stop accepting new work and discard everything still queued.
    fn shutdown_now(&self);

    /// Block until every worker has exited, up to `timeout`.
    fn await_termination(&self, timeout: Duration) -> bool;

    fn is_shutdown(&self) -> bool;

    fn is_terminated(&self) -> bool;
}

/// Sizing and queueing parameters for a [`ThreadPool`].
pub(crate) struct PoolConfig {
    pub core: usize,
    pub max: usize,
    pub keep_alive: Option<Duration>,
    pub queue_capacity: Option<usize>,
}

/// A pool of OS worker threads sharing one job queue.
pub struct ThreadPool {
    inner: Arc<PoolInner>,
    tx: Mutex<Option<Sender<Job>>>,
}

struct PoolInner {
    rx: Receiver<Job>,
    factory: Arc<NamedThreadFactory>,
    core: usize,
    max: usize,
    keep_alive: Option<Duration>,
    queue_capacity: Option<usize>,
    force: AtomicBool,
    live: Mutex<usize>,
    terminated: Condvar,
}

impl PoolInner {
    fn worker_loop(&self) {
        loop {
            if self.force.load(Ordering::Acquire) {
                break;
            }
            let job = match self.keep_alive {
                Some(keep_alive) => match self.rx.recv_timeout(keep_alive) {
                    Ok(job) => job,
                    Err(RecvTimeoutError::Timeout) => {
                        if self.try_retire() {
                            return;
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match self.rx.recv() {
                    Ok(job) => job,
                    Err(_) => break,
                },
            };
            self.run_job(job);
        }
        self.worker_exited();
    }

    fn run_job(&self, job: Job) {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
            let current = std::thread::current();
            let name = current.name().unwrap_or("unnamed");
            match self.factory.panic_handler() {
                Some(handler) => handler(name, payload.as_ref()),
                None => warn!(thread = name, "worker job panicked"),
            }
        }
    }

    /// Retire a surplus worker. The decision and the live-count decrement
    /// are atomic so concurrent timeouts never shrink below `core`.
    fn try_retire(&self) -> bool {
        let mut live = self.live.lock().unwrap();
        if *live > self.core {
            *live -= 1;
            true
        } else {
            false
        }
    }

    fn worker_exited(&self) {
        let mut live = self.live.lock().unwrap();
        *live -= 1;
        if *live == 0 {
            self.terminated.notify_all();
        }
    }
}

impl ThreadPool {
    pub(crate) fn new(
        config: PoolConfig,
        factory: Arc<NamedThreadFactory>,
    ) -> Result<Self, BuildError> {
        if config.core == 0 {
            return Err(BuildError::ZeroWorkers);
        }
        if config.max < config.core {
            return Err(BuildError::MaxBelowCore {
                core: config.core,
                max: config.max,
            });
        }
        if config.queue_capacity == Some(0) {
            return Err(BuildError::ZeroQueueCapacity);
        }

        let (tx, rx) = match config.queue_capacity {
            Some(capacity) => flume::bounded(capacity),
            None => flume::unbounded(),
        };
        let inner = Arc::new(PoolInner {
            rx,
            factory,
            core: config.core,
            max: config.max,
            keep_alive: config.keep_alive,
            queue_capacity: config.queue_capacity,
            force: AtomicBool::new(false),
            live: Mutex::new(0),
            terminated: Condvar::new(),
        });
        let pool = Self {
            inner,
            tx: Mutex::new(Some(tx)),
        };
        for _ in 0..config.core {
            pool.spawn_worker().map_err(BuildError::Spawn)?;
        }
        Ok(pool)
    }

    /// Submit a job for execution.
    pub fn submit<F>(&self, job: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.submit_boxed(Box::new(job))
    }

    /// Number of live worker threads.
    pub fn worker_count(&self) -> usize {
        *self.inner.live.lock().unwrap()
    }

    fn spawn_worker(&self) -> std::io::Result<()> {
        *self.inner.live.lock().unwrap() += 1;
        let inner = Arc::clone(&self.inner);
        match self.inner.factory.spawn(Box::new(move || inner.worker_loop())) {
            Ok(_handle) => Ok(()),
            Err(error) => {
                self.inner.worker_exited();
                Err(error)
            }
        }
    }

    /// Add a surplus worker if the pool is below `max`.
    fn try_grow(&self) -> std::io::Result<bool> {
        {
            let mut live = self.inner.live.lock().unwrap();
            if *live >= self.inner.max {
                return Ok(false);
            }
            *live += 1;
        }
        let inner = Arc::clone(&self.inner);
        match self.inner.factory.spawn(Box::new(move || inner.worker_loop())) {
            Ok(_handle) => Ok(true),
            Err(error) => {
                self.inner.worker_exited();
                Err(error)
            }
        }
    }

    /// Count an auxiliary thread (e.g. a timer) against this pool's
    /// termination tracking.
    pub(crate) fn register_aux(&self) {
        *self.inner.live.lock().unwrap() += 1;
    }

    pub(crate) fn aux_exited(&self) {
        self.inner.worker_exited();
    }
}

impl WorkerPool for ThreadPool {
    fn submit_boxed(&self, job: Job) -> Result<(), SubmitError> {
        let tx = self.tx.lock().unwrap().clone();
        let Some(tx) = tx else {
            return Err(SubmitError::Shutdown);
        };
        match tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Disconnected(_)) => Err(SubmitError::Shutdown),
            Err(TrySendError::Full(job)) => {
                if self.try_grow()? {
                    tx.send(job).map_err(|_| SubmitError::Shutdown)
                } else {
                    Err(SubmitError::QueueFull {
                        capacity: self.inner.queue_capacity.unwrap_or(0),
                    })
                }
            }
        }
    }

    fn shutdown(&self) {
        if self.tx.lock().unwrap().take().is_some() {
            debug!("worker pool shutdown: no longer accepting jobs");
        }
    }

    fn shutdown_now(&self) {
        self.shutdown();
        self.inner.force.store(true, Ordering::Release);
        let mut discarded = 0usize;
        while self.inner.rx.try_recv().is_ok() {
            discarded += 1;
        }
        if discarded > 0 {
            warn!(discarded, "forced shutdown discarded queued jobs");
        }
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut live = self.inner.live.lock().unwrap();
        while *live > 0 {
            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    let (guard, _) = self
                        .inner
                        .terminated
                        .wait_timeout(live, deadline - now)
                        .unwrap();
                    live = guard;
                }
                None => {
                    live = self.inner.terminated.wait(live).unwrap();
                }
            }
        }
        true
    }

    fn is_shutdown(&self) -> bool {
        self.tx.lock().unwrap().is_none()
    }

    fn is_terminated(&self) -> bool {
        self.is_shutdown() && *self.inner.live.lock().unwrap() == 0
    }
}

impl fmt::Debug for ThreadPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadPool")
            .field("core", &self.inner.core)
            .field("max", &self.inner.max)
            .field("live", &self.worker_count())
            .field("is_shutdown", &self.is_shutdown())
            .finish()
    }
}
