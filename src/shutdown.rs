//! Graceful-then-forced pool termination.

use std::time::Duration;

use tracing::warn;

use crate::pool::WorkerPool;

const SHUTDOWN_RETRIES: u32 = 3;
const SHUTDOWN_WAIT: Duration = Duration::from_millis(100);

/// Terminate a pool, giving in-flight work a bounded chance to drain.
///
/// Signals the pool to stop accepting work, then waits up to three rounds
/// of 100 ms for it to terminate. If the rounds are exhausted, forced
/// termination is applied unconditionally, so this never blocks much past
/// 300 ms of graceful waiting.
pub fn terminate(pool: &dyn WorkerPool) {
    pool.shutdown();
    let mut retry = SHUTDOWN_RETRIES;
    while retry > 0 {
        retry -= 1;
        if pool.await_termination(SHUTDOWN_WAIT) {
            return;
        }
    }
    warn!(
        rounds = SHUTDOWN_RETRIES,
        wait_ms = SHUTDOWN_WAIT.as_millis() as u64,
        "pool did not drain in time, forcing termination"
    );
    pool.shutdown_now();
}
