pub mod key;
pub mod sweeper;
pub mod types;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::error::Result;

pub use self::key::CacheKey;
pub use self::sweeper::SweeperHandle;
pub use self::types::{CacheStats, CacheStatsSnapshot};
use self::types::{CacheEntry, EntryState, SharedFetch};

/// Default time-to-live for cached responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// ResponseCache -- public facade
// ---------------------------------------------------------------------------

/// In-memory response cache with request collapsing.
///
/// Concurrent `get`s for one key share a single fetch. Failed fetches are not
/// cached. Cheap to clone; clones share the map.
pub struct ResponseCache<V> {
    inner: Arc<CacheInner<V>>,
}

impl<V> Clone for ResponseCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

pub(crate) struct CacheInner<V> {
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
    generation: AtomicU64,
    stats: CacheStats,
}

enum Lookup<V> {
    Hit(V),
    Join(SharedFetch<V>),
    Miss,
}

impl<V> ResponseCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                entries: Mutex::new(HashMap::new()),
                default_ttl,
                generation: AtomicU64::new(0),
                stats: CacheStats::new(),
            }),
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.inner.default_ttl
    }

    /// Fresh value for `key`, or the result of `fetcher` with the default ttl.
    pub async fn get<F, Fut>(&self, key: &str, fetcher: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        self.get_with_ttl(key, self.inner.default_ttl, fetcher).await
    }

    /// Fresh value for `key`, or the result of `fetcher` stored for `ttl`.
    ///
    /// A fetch already in flight for `key` is joined instead of starting a
    /// second one. A failed fetch removes the entry.
    pub async fn get_with_ttl<F, Fut>(&self, key: &str, ttl: Duration, fetcher: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let fetch = match self.lookup(key) {
            Lookup::Hit(value) => return Ok(value),
            Lookup::Join(fetch) => fetch,
            Lookup::Miss => {
                // Build the future outside the lock; the fetcher may touch the
                // cache itself.
                let fut = fetcher();
                self.begin_fetch(key, ttl, fut)
            }
        };
        fetch.await
    }

    fn lookup(&self, key: &str) -> Lookup<V> {
        let entries = self.inner.entries.lock();
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) => match &entry.state {
                EntryState::Ready(value) if entry.is_fresh(now) => {
                    self.inner.stats.record_hit();
                    debug!(key, "Cache hit");
                    Lookup::Hit(value.clone())
                }
                EntryState::Pending { fetch, .. } => {
                    self.inner.stats.record_collapsed();
                    debug!(key, "Joining in-flight fetch");
                    Lookup::Join(fetch.clone())
                }
                EntryState::Ready(_) => {
                    self.inner.stats.record_miss();
                    debug!(key, "Cache entry stale");
                    Lookup::Miss
                }
            },
            None => {
                self.inner.stats.record_miss();
                debug!(key, "Cache miss");
                Lookup::Miss
            }
        }
    }

    /// Register `fut` as the pending fetch for `key`, unless another caller
    /// registered one in the meantime, in which case that one is joined and
    /// `fut` is dropped unpolled.
    fn begin_fetch<Fut>(&self, key: &str, ttl: Duration, fut: Fut) -> SharedFetch<V>
    where
        Fut: Future<Output = Result<V>> + Send + 'static,
    {
        let mut entries = self.inner.entries.lock();
        if let Some(entry) = entries.get(key) {
            match &entry.state {
                EntryState::Pending { fetch, .. } => return fetch.clone(),
                EntryState::Ready(value) if entry.is_fresh(Instant::now()) => {
                    let value = value.clone();
                    return async move { Ok(value) }.boxed().shared();
                }
                EntryState::Ready(_) => {}
            }
        }

        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed);
        let weak: Weak<CacheInner<V>> = Arc::downgrade(&self.inner);
        let owned_key = key.to_string();
        let shared = async move {
            let outcome = fut.await;
            if let Some(inner) = weak.upgrade() {
                inner.settle(&owned_key, generation, &outcome, ttl);
            }
            outcome
        }
        .boxed()
        .shared();

        entries.insert(
            key.to_string(),
            CacheEntry::pending(shared.clone(), generation, ttl),
        );
        shared
    }

    /// Seed `key` with the default ttl.
    pub fn set(&self, key: &str, value: V) {
        self.set_with_ttl(key, value, self.inner.default_ttl);
    }

    /// Seed `key`. Replaces a pending fetch, whose result is then not stored.
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) {
        self.inner
            .entries
            .lock()
            .insert(key.to_string(), CacheEntry::ready(value, ttl));
        debug!(key, ttl_secs = ttl.as_secs(), "Cache set");
    }

    /// Fresh value for `key` without fetching.
    pub fn peek(&self, key: &str) -> Option<V> {
        let entries = self.inner.entries.lock();
        let entry = entries.get(key)?;
        match &entry.state {
            EntryState::Ready(value) if entry.is_fresh(Instant::now()) => Some(value.clone()),
            _ => None,
        }
    }

    /// Invalidate one key. Returns whether an entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let removed = self.inner.entries.lock().remove(key).is_some();
        if removed {
            debug!(key, "Cache entry invalidated");
        }
        removed
    }

    /// Invalidate every key starting with `prefix`. Returns the count removed.
    pub fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(prefix, removed, "Cache entries invalidated");
        }
        removed
    }

    pub fn clear(&self) {
        self.inner.entries.lock().clear();
        debug!("Cache cleared");
    }

    /// Drop ready entries older than their ttl. Returns the count removed.
    pub fn cleanup(&self) -> usize {
        self.inner.cleanup()
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStatsSnapshot {
        self.inner.snapshot()
    }

    /// Run [`cleanup`](Self::cleanup) every `period` until the handle drops.
    pub fn spawn_sweeper(&self, period: Duration) -> SweeperHandle {
        sweeper::spawn(Arc::downgrade(&self.inner), period)
    }
}

impl<V> CacheInner<V> {
    /// Store the outcome of a pending fetch, if its entry is still the one
    /// that started it.
    fn settle(&self, key: &str, generation: u64, outcome: &Result<V>, ttl: Duration)
    where
        V: Clone,
    {
        let mut entries = self.entries.lock();
        let current = matches!(
            entries.get(key).map(|e| &e.state),
            Some(EntryState::Pending { generation: g, .. }) if *g == generation
        );
        if !current {
            debug!(key, "Fetch result discarded, entry invalidated while pending");
            return;
        }
        match outcome {
            Ok(value) => {
                entries.insert(key.to_string(), CacheEntry::ready(value.clone(), ttl));
            }
            Err(e) => {
                entries.remove(key);
                debug!(key, error = %e, "Fetch failed, entry removed");
            }
        }
    }

    pub(crate) fn cleanup(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    pub(crate) fn snapshot(&self) -> CacheStatsSnapshot {
        let now = Instant::now();
        let entries = self.entries.lock();
        let (mut valid, mut expired, mut pending) = (0, 0, 0);
        for entry in entries.values() {
            if entry.is_pending() {
                pending += 1;
            } else if entry.is_fresh(now) {
                valid += 1;
            } else {
                expired += 1;
            }
        }
        CacheStatsSnapshot::new(&self.stats, entries.len(), valid, expired, pending)
    }
}

impl<V> std::fmt::Debug for ResponseCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("entries", &self.inner.entries.lock().len())
            .field("default_ttl", &self.inner.default_ttl)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
