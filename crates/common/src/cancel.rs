use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// A cancellation token with an attached deadline, derived the way the
/// taskflow engine imposes per-stage budgets (`WithTimeout`/`WithCancel` in
/// the design notes). Cooperative: callers check `is_canceled()`/`is_expired()`
/// at suspension points, never preemptively.
#[derive(Clone)]
pub struct Cancellation {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    /// Derive a child token bound to `self`'s lifetime plus its own deadline.
    /// Canceling the child never cancels the parent; canceling the parent
    /// cancels every derived child.
    pub fn child_with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        Self {
            token: self.token.child_token(),
            deadline: Some(match self.deadline {
                Some(parent) => parent.min(deadline),
                None => deadline,
            }),
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_canceled(&self) -> bool {
        self.token.is_cancelled() || self.is_expired()
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// True when the deadline (not an explicit `cancel()`) is what tripped
    /// cancellation — the caller surfaces `timedOut` alongside `canceled`.
    pub fn timed_out(&self) -> bool {
        self.is_expired() && !self.token.is_cancelled()
    }

    /// Resolves when canceled or the deadline passes, whichever comes first.
    pub async fn canceled(&self) {
        match self.deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                tokio::select! {
                    _ = self.token.cancelled() => {}
                    _ = tokio::time::sleep(remaining) => {}
                }
            }
            None => self.token.cancelled().await,
        }
    }
}

impl Default for Cancellation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_observed() {
        let c = Cancellation::new();
        assert!(!c.is_canceled());
        c.cancel();
        assert!(c.is_canceled());
        assert!(!c.timed_out());
    }

    #[tokio::test]
    async fn deadline_expires() {
        let c = Cancellation::with_timeout(Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(c.is_canceled());
        assert!(c.timed_out());
    }

    #[tokio::test]
    async fn child_inherits_parent_cancel() {
        let parent = Cancellation::new();
        let child = parent.child_with_timeout(Duration::from_secs(5));
        assert!(!child.is_canceled());
        parent.cancel();
        assert!(child.is_canceled());
    }
}
