// Corral: worker pool lifecycle management.
//
// Pools are built through configurable thread factories, tracked in a
// namespace/group registry for coordinated graceful shutdown, and sized
// from the available processor count. A generation-swapped concurrent
// counter with bounded top-N snapshots rides along for hot-path ranking.

pub mod builders;
pub mod error;
pub mod factory;
pub mod heap;
pub mod logging;
pub mod pool;
pub mod registry;
pub mod scheduled;
pub mod shutdown;
pub mod sizing;
pub mod topn;

// Re-export commonly used types
pub use builders::{
    DEFAULT_NAMESPACE, ManagedPools, custom_pool, fixed_pool, scheduled_pool, single_pool,
};
pub use error::{BuildError, SubmitError};
pub use factory::{
    DefaultThreadFactory, MAX_PRIORITY, MIN_PRIORITY, NamedThreadFactory, PanicHandler,
    ThreadFactory, ThreadFactoryBuilder,
};
pub use heap::FixedSizePriorityQueue;
pub use pool::{Job, ThreadPool, WorkerPool};
pub use registry::{PoolRegistry, ShutdownGuard};
pub use scheduled::ScheduledThreadPool;
pub use shutdown::terminate;
pub use sizing::{available_processors, suitable_worker_count, suitable_worker_count_default};
pub use topn::TopNCounter;
