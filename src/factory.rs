//! # Thread Factory Module
//!
//! Configurable strategies for spawning the OS threads that back worker
//! pools: naming templates with a numeric sequence suffix, stack size,
//! scheduling priority and panic observation.
//!
//! ## Key Concepts
//! - `ThreadFactory`: the underlying thread-creation strategy a factory
//!   decorates
//! - `NamedThreadFactory`: a fully configured factory, built once and shared
//!   by all workers of a pool
//! - `ThreadFactoryBuilder`: validates every option before a factory exists

use std::any::Any;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

use tracing::error;
#[cfg(not(unix))]
use tracing::debug;
#[cfg(unix)]
use tracing::warn;

use crate::error::BuildError;

/// Lowest priority (nice value) a worker thread may request.
pub const MIN_PRIORITY: i32 = -20;

/// Highest priority (nice value) a worker thread may request.
pub const MAX_PRIORITY: i32 = 19;

const SEQUENCE_PLACEHOLDER: &str = "{}";

/// Callback invoked with the thread name and panic payload when a worker's
/// job panics.
pub type PanicHandler = Arc<dyn Fn(&str, &(dyn Any + Send)) + Send + Sync>;

/// Underlying thread-creation strategy.
///
/// Yields the `std::thread::Builder` a [`NamedThreadFactory`] decorates with
/// its name, stack size and priority settings before spawning.
pub trait ThreadFactory: Send + Sync {
    fn thread_builder(&self) -> thread::Builder;
}

/// The undecorated platform strategy.
#[derive(Debug, Default)]
pub struct DefaultThreadFactory;

impl ThreadFactory for DefaultThreadFactory {
    fn thread_builder(&self) -> thread::Builder {
        thread::Builder::new()
    }
}

/// A configured factory for pool worker threads.
///
/// Thread names are produced from the name format by substituting a
/// monotonically increasing sequence id for the `{}` placeholder.
pub struct NamedThreadFactory {
    name_format: Option<String>,
    sequence: AtomicU64,
    priority: Option<i32>,
    stack_size: Option<usize>,
    panic_handler: Option<PanicHandler>,
    base: Arc<dyn ThreadFactory>,
}

impl NamedThreadFactory {
    /// Factory with just a name template and platform defaults.
    pub fn named(format: impl Into<String>) -> Result<Self, BuildError> {
        ThreadFactoryBuilder::new().name_format(format).build()
    }

    /// Spawn a thread running `job`.
    pub fn spawn(
        &self,
        job: Box<dyn FnOnce() + Send + 'static>,
    ) -> io::Result<thread::JoinHandle<()>> {
        let mut builder = self.base.thread_builder();
        if let Some(format) = &self.name_format {
            let id = self.sequence.fetch_add(1, Ordering::Relaxed);
            builder = builder.name(format.replacen(SEQUENCE_PLACEHOLDER, &id.to_string(), 1));
        }
        if let Some(bytes) = self.stack_size {
            builder = builder.stack_size(bytes);
        }
        let priority = self.priority;
        let handler = self.panic_handler.clone();
        builder.spawn(move || {
            if let Some(nice) = priority {
                apply_priority(nice);
            }
            if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                let current = thread::current();
                let name = current.name().unwrap_or("unnamed");
                match &handler {
                    Some(handler) => handler(name, payload.as_ref()),
                    None => error!(thread = name, "worker thread terminated by panic"),
                }
            }
        })
    }

    pub(crate) fn panic_handler(&self) -> Option<&PanicHandler> {
        self.panic_handler.as_ref()
    }
}

impl Default for NamedThreadFactory {
    fn default() -> Self {
        Self {
            name_format: None,
            sequence: AtomicU64::new(0),
            priority: None,
            stack_size: None,
            panic_handler: None,
            base: Arc::new(DefaultThreadFactory),
        }
    }
}

impl std::fmt::Debug for NamedThreadFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NamedThreadFactory")
            .field("name_format", &self.name_format)
            .field("priority", &self.priority)
            .field("stack_size", &self.stack_size)
            .field("has_panic_handler", &self.panic_handler.is_some())
            .finish()
    }
}

/// Builder for [`NamedThreadFactory`].
///
/// Every option is validated in [`build`](Self::build); invalid
/// configuration fails fast instead of being silently defaulted.
#[derive(Default)]
pub struct ThreadFactoryBuilder {
    name_format: Option<String>,
    priority: Option<i32>,
    stack_size: Option<usize>,
    panic_handler: Option<PanicHandler>,
    base: Option<Arc<dyn ThreadFactory>>,
}

impl ThreadFactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Template for worker thread names. A `-{}` sequence suffix is appended
    /// when the template carries no `{}` placeholder of its own.
    pub fn name_format(mut self, format: impl Into<String>) -> Self {
        self.name_format = Some(format.into());
        self
    }

    /// Scheduling priority as a nice value, [`MIN_PRIORITY`]..=[`MAX_PRIORITY`].
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Stack size in bytes for each worker thread.
    pub fn stack_size(mut self, bytes: usize) -> Self {
        self.stack_size = Some(bytes);
        self
    }

    /// Observer for panics escaping a worker's job. Panics are observed,
    /// never suppressed into silence.
    pub fn panic_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&str, &(dyn Any + Send)) + Send + Sync + 'static,
    {
        self.panic_handler = Some(Arc::new(handler));
        self
    }

    /// Underlying thread-creation strategy to decorate. Defaults to the
    /// platform default.
    pub fn base(mut self, factory: Arc<dyn ThreadFactory>) -> Self {
        self.base = Some(factory);
        self
    }

    pub fn build(self) -> Result<NamedThreadFactory, BuildError> {
        let name_format = match self.name_format {
            Some(format) if format.is_empty() => return Err(BuildError::EmptyNameFormat),
            Some(mut format) => {
                if !format.contains(SEQUENCE_PLACEHOLDER) {
                    format.push_str("-{}");
                }
                Some(format)
            }
            None => None,
        };
        if let Some(priority) = self.priority {
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&priority) {
                return Err(BuildError::PriorityOutOfRange {
                    value: priority,
                    min: MIN_PRIORITY,
                    max: MAX_PRIORITY,
                });
            }
        }
        if self.stack_size == Some(0) {
            return Err(BuildError::ZeroStackSize);
        }
        Ok(NamedThreadFactory {
            name_format,
            sequence: AtomicU64::new(0),
            priority: self.priority,
            stack_size: self.stack_size,
            panic_handler: self.panic_handler,
            base: self.base.unwrap_or_else(|| Arc::new(DefaultThreadFactory)),
        })
    }
}

/// Apply a nice value to the calling thread. On Linux each thread carries
/// its own nice value, so this scopes to the worker being started.
#[cfg(unix)]
fn apply_priority(nice: i32) {
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS as _, 0, nice as libc::c_int) };
    if rc != 0 {
        warn!(nice, "failed to apply worker thread priority");
    }
}

#[cfg(not(unix))]
fn apply_priority(nice: i32) {
    debug!(nice, "thread priority is not supported on this platform");
}
