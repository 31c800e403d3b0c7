//! Delayed and repeating execution on top of a worker pool.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use flume::{Receiver, RecvTimeoutError, Sender};
use tracing::debug;

use crate::error::{BuildError, SubmitError};
use crate::factory::NamedThreadFactory;
use crate::pool::{Job, PoolConfig, ThreadPool, WorkerPool};

enum Task {
    Once(Job),
    Repeating {
        every: Duration,
        run: Arc<dyn Fn() + Send + Sync>,
    },
}

struct ScheduledEntry {
    due: Instant,
    seq: u64,
    task: Task,
}

impl PartialEq for ScheduledEntry {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl Eq for ScheduledEntry {}

impl PartialOrd for ScheduledEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScheduledEntry {
    // Reversed so the binary max-heap pops the earliest deadline first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.due.cmp(&self.due).then(other.seq.cmp(&self.seq))
    }
}

/// A worker pool that also runs jobs after a delay or on a fixed period.
///
/// A dedicated timer thread keeps a deadline-ordered queue and dispatches
/// due jobs onto the backing pool. At shutdown the timer stops and jobs that
/// are not yet due are discarded; already dispatched jobs drain like any
/// other queued work.
pub struct ScheduledThreadPool {
    pool: Arc<ThreadPool>,
    timer_tx: Mutex<Option<Sender<ScheduledEntry>>>,
    sequence: AtomicU64,
}

impl ScheduledThreadPool {
    pub(crate) fn new(
        workers: usize,
        factory: Arc<NamedThreadFactory>,
    ) -> Result<Self, BuildError> {
        let pool = Arc::new(ThreadPool::new(
            PoolConfig {
                core: workers,
                max: workers,
                keep_alive: None,
                queue_capacity: None,
            },
            Arc::clone(&factory),
        )?);
        let (timer_tx, timer_rx) = flume::unbounded();
        pool.register_aux();
        let timer_pool = Arc::clone(&pool);
        if let Err(error) = factory.spawn(Box::new(move || {
            timer_loop(timer_rx, &timer_pool);
            timer_pool.aux_exited();
        })) {
            pool.aux_exited();
            return Err(BuildError::Spawn(error));
        }
        Ok(Self {
            pool,
            timer_tx: Mutex::new(Some(timer_tx)),
            sequence: AtomicU64::new(0),
        })
    }

    /// Run `job` once after `delay`.
    pub fn schedule<F>(&self, delay: Duration, job: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.send_entry(delay, Task::Once(Box::new(job)))
    }

    /// Run `job` every `every`, first after `initial_delay`. Fixed-rate: the
    /// next deadline is derived from the previous one, not from when the job
    /// actually ran.
    pub fn schedule_repeating<F>(
        &self,
        initial_delay: Duration,
        every: Duration,
        job: F,
    ) -> Result<(), SubmitError>
    where
        F: Fn() + Send + Sync + 'static,
    {
        if every.is_zero() {
            return Err(SubmitError::ZeroPeriod);
        }
        self.send_entry(
            initial_delay,
            Task::Repeating {
                every,
                run: Arc::new(job),
            },
        )
    }

    /// Run `job` immediately on the backing pool.
    pub fn submit<F>(&self, job: F) -> Result<(), SubmitError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.pool.submit(job)
    }

    fn send_entry(&self, delay: Duration, task: Task) -> Result<(), SubmitError> {
        let tx = self.timer_tx.lock().unwrap().clone();
        let Some(tx) = tx else {
            return Err(SubmitError::Shutdown);
        };
        let entry = ScheduledEntry {
            due: Instant::now() + delay,
            seq: self.sequence.fetch_add(1, Ordering::Relaxed),
            task,
        };
        tx.send(entry).map_err(|_| SubmitError::Shutdown)
    }

    fn stop_timer(&self) {
        // Dropping the sender disconnects the timer loop; its pending
        // entries are discarded with the heap.
        self.timer_tx.lock().unwrap().take();
    }
}

impl WorkerPool for ScheduledThreadPool {
    fn submit_boxed(&self, job: Job) -> Result<(), SubmitError> {
        self.pool.submit_boxed(job)
    }

    fn shutdown(&self) {
        self.stop_timer();
        self.pool.shutdown();
    }

    fn shutdown_now(&self) {
        self.stop_timer();
        self.pool.shutdown_now();
    }

    fn await_termination(&self, timeout: Duration) -> bool {
        self.pool.await_termination(timeout)
    }

    fn is_shutdown(&self) -> bool {
        self.pool.is_shutdown()
    }

    fn is_terminated(&self) -> bool {
        self.pool.is_terminated()
    }
}

impl std::fmt::Debug for ScheduledThreadPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledThreadPool")
            .field("pool", &self.pool)
            .field("timer_running", &self.timer_tx.lock().unwrap().is_some())
            .finish()
    }
}

fn timer_loop(rx: Receiver<ScheduledEntry>, pool: &ThreadPool) {
    let mut heap: BinaryHeap<ScheduledEntry> = BinaryHeap::new();
    loop {
        if !dispatch_due(&mut heap, pool) {
            break;
        }
        let received = match heap.peek() {
            Some(next) => {
                let wait = next.due.saturating_duration_since(Instant::now());
                match rx.recv_timeout(wait) {
                    Ok(entry) => Some(entry),
                    Err(RecvTimeoutError::Timeout) => None,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(entry) => Some(entry),
                Err(_) => break,
            },
        };
        if let Some(entry) = received {
            heap.push(entry);
        }
    }
}

/// Dispatch every due entry to the pool. Returns false once the pool stops
/// accepting work, which ends the timer.
fn dispatch_due(heap: &mut BinaryHeap<ScheduledEntry>, pool: &ThreadPool) -> bool {
    while heap
        .peek()
        .is_some_and(|entry| entry.due <= Instant::now())
    {
        let Some(entry) = heap.pop() else {
            break;
        };
        match entry.task {
            Task::Once(job) => {
                if pool.submit_boxed(job).is_err() {
                    debug!("backing pool is shut down, stopping timer");
                    return false;
                }
            }
            Task::Repeating { every, run } => {
                let job = Arc::clone(&run);
                if pool.submit_boxed(Box::new(move || job())).is_err() {
                    debug!("backing pool is shut down, stopping timer");
                    return false;
                }
                heap.push(ScheduledEntry {
                    due: entry.due + every,
                    seq: entry.seq,
                    task: Task::Repeating { every, run },
                });
            }
        }
    }
    true
}
