//! Concurrent per-key counting reduced to an approximate top-N leaderboard.

use std::hash::Hash;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use arc_swap::ArcSwap;
use dashmap::DashMap;

use crate::heap::FixedSizePriorityQueue;

/// Thread-safe counter table with bounded top-N snapshots.
///
/// Writers accumulate into the live generation lock-free; [`top_n`]
/// atomically swaps in a fresh generation and folds the retired one through
/// a fixed-capacity ranking buffer.
///
/// # Approximation
///
/// The swap is not coordinated with individual writers: an update racing the
/// snapshot lands in either the outgoing or the incoming generation — never
/// both, never neither. Counts are exact whenever `top_n` runs with no
/// concurrent writers.
///
/// [`top_n`]: Self::top_n
pub struct TopNCounter<K>
where
    K: Eq + Hash + Clone,
{
    generation: ArcSwap<DashMap<K, AtomicI64>>,
}

impl<K> TopNCounter<K>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            generation: ArcSwap::from_pointee(DashMap::new()),
        }
    }

    /// Increment the count for `key` by one.
    pub fn increment(&self, key: K) {
        self.add(key, 1);
    }

    /// Increment the count for `key` by `count`.
    pub fn add(&self, key: K, count: i64) {
        let table = self.generation.load();
        table
            .entry(key)
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(count, Ordering::Relaxed);
    }

    /// Directly set the count for `key`.
    pub fn set(&self, key: K, count: i64) {
        let table = self.generation.load();
        table
            .entry(key)
            .or_insert_with(|| AtomicI64::new(0))
            .store(count, Ordering::Relaxed);
    }

    /// Discard all accumulated counts.
    pub fn reset(&self) {
        self.generation.store(Arc::new(DashMap::new()));
    }

    /// Retire the live generation and return its `n` highest-counted keys,
    /// without order. Concurrent writers continue into the fresh generation
    /// unblocked.
    pub fn top_n(&self, n: usize) -> Vec<(K, i64)> {
        let retired = self.generation.swap(Arc::new(DashMap::new()));
        let mut queue = FixedSizePriorityQueue::new(n, |a: &(K, i64), b: &(K, i64)| a.1.cmp(&b.1));
        for entry in retired.iter() {
            queue.offer((entry.key().clone(), entry.value().load(Ordering::Relaxed)));
        }
        queue.into_vec()
    }
}

impl<K> Default for TopNCounter<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
