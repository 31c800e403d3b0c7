use std::io;
use thiserror::Error;

/// Errors raised while configuring a thread factory or constructing a pool.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("thread name format must not be empty")]
    EmptyNameFormat,
    #[error("priority {value} is outside the legal range {min}..={max}")]
    PriorityOutOfRange { value: i32, min: i32, max: i32 },
    #[error("stack size must be non-zero")]
    ZeroStackSize,
    #[error("pool requires at least one core worker")]
    ZeroWorkers,
    #[error("max workers ({max}) must not be less than core workers ({core})")]
    MaxBelowCore { core: usize, max: usize },
    #[error("queue capacity must be non-zero")]
    ZeroQueueCapacity,
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),
}

/// Errors raised when submitting work to a pool.
#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("pool is shut down")]
    Shutdown,
    #[error("job queue is full (capacity: {capacity})")]
    QueueFull { capacity: usize },
    #[error("repeat period must be non-zero")]
    ZeroPeriod,
    #[error("failed to spawn surplus worker: {0}")]
    Spawn(#[from] io::Error),
}
