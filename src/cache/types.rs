use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use serde::Serialize;
use tokio::time::Instant;

use crate::error::Result;

// ---------------------------------------------------------------------------
// Entries
// ---------------------------------------------------------------------------

/// In-flight fetch that every caller for the same key awaits.
pub(crate) type SharedFetch<V> = Shared<BoxFuture<'static, Result<V>>>;

pub(crate) enum EntryState<V> {
    Ready(V),
    Pending { fetch: SharedFetch<V>, generation: u64 },
}

pub(crate) struct CacheEntry<V> {
    pub state: EntryState<V>,
    pub stored_at: Instant,
    pub ttl: Duration,
}

impl<V> CacheEntry<V> {
    pub fn ready(value: V, ttl: Duration) -> Self {
        Self {
            state: EntryState::Ready(value),
            stored_at: Instant::now(),
            ttl,
        }
    }

    pub fn pending(fetch: SharedFetch<V>, generation: u64, ttl: Duration) -> Self {
        Self {
            state: EntryState::Pending { fetch, generation },
            stored_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, EntryState::Pending { .. })
    }

    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    /// Ready and younger than its ttl.
    pub fn is_fresh(&self, now: Instant) -> bool {
        !self.is_pending() && self.age(now) < self.ttl
    }

    /// Ready and older than its ttl; what the sweep removes.
    pub fn is_expired(&self, now: Instant) -> bool {
        !self.is_pending() && self.age(now) > self.ttl
    }
}

// ---------------------------------------------------------------------------
// Stats (atomic counters, lock-free)
// ---------------------------------------------------------------------------

/// Runtime cache counters.
#[derive(Debug, Default)]
pub struct CacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub collapsed: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A caller joined a fetch already in flight.
    pub fn record_collapsed(&self) {
        self.collapsed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Serializable snapshot of cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CacheStatsSnapshot {
    /// Entries in the map, pending included.
    pub total: usize,
    pub valid: usize,
    pub expired: usize,
    pub pending: usize,
    pub hits: u64,
    pub misses: u64,
    pub collapsed: u64,
    pub hit_rate: f64,
}

impl CacheStatsSnapshot {
    pub(crate) fn new(counters: &CacheStats, total: usize, valid: usize, expired: usize, pending: usize) -> Self {
        let hits = counters.hits.load(Ordering::Relaxed);
        let misses = counters.misses.load(Ordering::Relaxed);
        let collapsed = counters.collapsed.load(Ordering::Relaxed);
        let lookups = hits + misses + collapsed;
        let hit_rate = if lookups > 0 {
            (hits + collapsed) as f64 / lookups as f64
        } else {
            0.0
        };
        Self {
            total,
            valid,
            expired,
            pending,
            hits,
            misses,
            collapsed,
            hit_rate,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
