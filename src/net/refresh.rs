//! Single-flight access token refresh.
//!
//! The first caller that hits a 401 while the coordinator is idle becomes the
//! leader and performs the refresh. Callers arriving while it runs queue up
//! and receive the leader's outcome in arrival order.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{Error, Result};

type Waiter = oneshot::Sender<Result<String>>;

enum RefreshState {
    Idle,
    Refreshing { waiters: VecDeque<Waiter> },
}

/// Deduplicates concurrent refreshes.
pub struct RefreshCoordinator {
    state: Mutex<RefreshState>,
    refreshes: AtomicU64,
}

impl Default for RefreshCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl RefreshCoordinator {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RefreshState::Idle),
            refreshes: AtomicU64::new(0),
        }
    }

    /// Number of refreshes actually performed.
    pub fn refresh_count(&self) -> u64 {
        self.refreshes.load(Ordering::Relaxed)
    }

    pub fn is_refreshing(&self) -> bool {
        matches!(*self.state.lock(), RefreshState::Refreshing { .. })
    }

    /// Obtain a token to retry with after a request sent with `stale` got 401.
    ///
    /// If `current()` already differs from `stale` while idle, a refresh
    /// finished after that request left and its token is reused.
    pub async fn obtain<C, F, Fut>(&self, stale: Option<&str>, current: C, refresh: F) -> Result<String>
    where
        C: FnOnce() -> Option<String>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String>>,
    {
        let queued = {
            let mut state = self.state.lock();
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push_back(tx);
                    debug!(position = waiters.len(), "Refresh in flight, queued");
                    Some(rx)
                }
                RefreshState::Idle => {
                    if let Some(token) = current().filter(|t| Some(t.as_str()) != stale) {
                        debug!("Token already refreshed, reusing");
                        return Ok(token);
                    }
                    *state = RefreshState::Refreshing {
                        waiters: VecDeque::new(),
                    };
                    None
                }
            }
        };

        if let Some(rx) = queued {
            return rx
                .await
                .unwrap_or_else(|_| Err(Error::Cancelled("token refresh abandoned".into())));
        }

        let mut guard = SettleGuard {
            coordinator: self,
            settled: false,
        };
        self.refreshes.fetch_add(1, Ordering::Relaxed);
        let outcome = refresh().await;
        guard.settle(outcome.clone());
        outcome
    }

    /// Return to idle and hand `outcome` to every queued waiter, oldest first.
    fn drain(&self, outcome: Result<String>) {
        let waiters = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => VecDeque::new(),
            }
        };
        if !waiters.is_empty() {
            debug!(waiters = waiters.len(), ok = outcome.is_ok(), "Releasing queued requests");
        }
        for waiter in waiters {
            // A waiter whose request was dropped has gone away.
            let _ = waiter.send(outcome.clone());
        }
    }
}

/// Drains the queue even when the leader's future is dropped mid-refresh.
struct SettleGuard<'a> {
    coordinator: &'a RefreshCoordinator,
    settled: bool,
}

impl SettleGuard<'_> {
    fn settle(&mut self, outcome: Result<String>) {
        self.settled = true;
        self.coordinator.drain(outcome);
    }
}

impl Drop for SettleGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Token refresh dropped before completion");
            self.coordinator
                .drain(Err(Error::Cancelled("token refresh abandoned".into())));
        }
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("refreshing", &self.is_refreshing())
            .field("refreshes", &self.refresh_count())
            .finish()
    }
}
