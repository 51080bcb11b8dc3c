//! Guards that let a consumer ignore results arriving after it went away.

use tokio_util::sync::CancellationToken;

/// Shared "still interested" signal.
///
/// Clones observe the same signal. Once [`retire`](Self::retire)d, work passed
/// through [`run`](Self::run) is dropped instead of awaited to completion.
#[derive(Debug, Clone, Default)]
pub struct Liveness {
    token: CancellationToken,
}

impl Liveness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_alive(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn retire(&self) {
        self.token.cancel();
    }

    /// A guard retired together with this one, or on its own.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Await `fut` while alive; `None` once retired, even mid-flight.
    pub async fn run<F: Future>(&self, fut: F) -> Option<F::Output> {
        tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            output = fut => self.is_alive().then_some(output),
        }
    }

    /// Apply `update` only while alive.
    pub fn apply<T>(&self, value: T, update: impl FnOnce(T)) -> bool {
        if self.is_alive() {
            update(value);
            true
        } else {
            false
        }
    }
}
