use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use super::CacheInner;

// ---------------------------------------------------------------------------
// Background expiry sweep
// ---------------------------------------------------------------------------

/// Stops the sweep task when dropped.
#[derive(Debug)]
pub struct SweeperHandle {
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SweeperHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn spawn<V>(cache: Weak<CacheInner<V>>, period: Duration) -> SweeperHandle
where
    V: Send + Sync + 'static,
{
    let task = tokio::spawn(async move {
        let start = tokio::time::Instant::now() + period;
        let mut interval = tokio::time::interval_at(start, period);
        // Don't pile up ticks after a stall.
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            // The cache is gone once every handle to it has dropped.
            let Some(inner) = cache.upgrade() else { break };
            let removed = inner.cleanup();
            let stats = inner.snapshot();
            debug!(
                removed,
                total = stats.total,
                valid = stats.valid,
                pending = stats.pending,
                hits = stats.hits,
                misses = stats.misses,
                "Cache sweep"
            );
        }
    });
    SweeperHandle { task }
}
