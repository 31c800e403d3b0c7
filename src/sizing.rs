//! Pool sizing helpers.

/// Environment variable overriding the detected processor count.
pub const PROCESSORS_ENV: &str = "CORRAL_PROCESSORS";

const DEFAULT_WORKER_MULTIPLE: usize = 2;

/// Number of processors available to the process.
///
/// Honors the [`PROCESSORS_ENV`] override when set to a positive integer,
/// otherwise asks the platform. Never returns zero.
pub fn available_processors() -> usize {
    std::env::var(PROCESSORS_ENV)
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|&count| count > 0)
        .unwrap_or_else(|| num_cpus::get().max(1))
}

/// Recommended worker count at the default multiple of 2 per processor.
pub fn suitable_worker_count_default() -> usize {
    suitable_worker_count(DEFAULT_WORKER_MULTIPLE)
}

/// Smallest power of two that is at least `available_processors() * multiple`.
///
/// Power-of-two pool sizes align with common sharding schemes downstream and
/// keep cache-line contention patterns predictable.
pub fn suitable_worker_count(multiple: usize) -> usize {
    let target = available_processors() * multiple;
    let mut count = 1;
    while count < target {
        count <<= 1;
    }
    count
}
