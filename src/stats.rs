//! Query counters for the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Monotonic query counters.
///
/// Owned by the dispatcher and updated with relaxed atomics; nothing is
/// ever reset.
#[derive(Default)]
pub struct Stats {
    queries: AtomicU64,
    cache_hits: AtomicU64,
    forwarded: AtomicU64,
    failures: AtomicU64,
    /// Cumulative upstream time in microseconds for averaging.
    upstream_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_query(&self) {
        self.queries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_forwarded(&self, upstream_time: Duration) {
        self.forwarded.fetch_add(1, Ordering::Relaxed);
        self.upstream_time_us
            .fetch_add(upstream_time.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn queries(&self) -> u64 {
        self.queries.load(Ordering::Relaxed)
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let forwarded = self.forwarded.load(Ordering::Relaxed);
        let total_us = self.upstream_time_us.load(Ordering::Relaxed);

        let avg_upstream_ms = if forwarded > 0 {
            (total_us as f64 / forwarded as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            queries: self.queries(),
            cache_hits: self.cache_hits(),
            forwarded,
            failures: self.failures.load(Ordering::Relaxed),
            avg_upstream_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSnapshot {
    pub queries: u64,
    pub cache_hits: u64,
    pub forwarded: u64,
    pub failures: u64,
    pub avg_upstream_ms: f64,
}

impl StatsSnapshot {
    /// Fraction of queries answered from cache; 0 before the first query.
    pub fn hit_ratio(&self) -> f64 {
        if self.queries == 0 {
            0.0
        } else {
            self.cache_hits as f64 / self.queries as f64
        }
    }
}
