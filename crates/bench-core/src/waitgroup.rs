//! Bounded wait-group for the worker population.
//!
//! Combines a counting semaphore (capping concurrently active members)
//! with a join barrier: [`LimitWaitGroup::wait`] resolves once every
//! member that entered has called [`LimitWaitGroup::done`].

use std::sync::Arc;

use tokio::sync::{Semaphore, watch};
use tokio_util::sync::CancellationToken;

use crate::error::{BenchError, Result};

// ═══════════════════════════════════════════════════════════════════════════════
// LIMIT WAIT GROUP
// ═══════════════════════════════════════════════════════════════════════════════

/// Counting semaphore plus join barrier for a fixed member population.
///
/// Handles are cheap clones sharing the same state, so members can carry
/// their own handle into spawned tasks and call [`done`](Self::done) from
/// there.
#[derive(Debug, Clone)]
pub struct LimitWaitGroup {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    slots: Semaphore,
    active: watch::Sender<usize>,
}

impl LimitWaitGroup {
    /// Create a wait-group admitting at most `limit` active members.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let (active, _) = watch::channel(0);
        Self {
            inner: Arc::new(Inner {
                slots: Semaphore::new(limit),
                active,
            }),
        }
    }

    /// Enter the group, suspending while `limit` members are active.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Cancelled`] if the semaphore was closed,
    /// which does not happen in normal operation.
    pub async fn add(&self) -> Result<()> {
        let permit = self
            .inner
            .slots
            .acquire()
            .await
            .map_err(|_| BenchError::Cancelled)?;
        permit.forget();
        self.inner.active.send_modify(|count| *count += 1);
        Ok(())
    }

    /// Enter the group, giving up when `token` is cancelled first.
    ///
    /// # Errors
    ///
    /// Returns [`BenchError::Cancelled`] if the token fires before a slot
    /// opens.
    pub async fn add_with_cancel(&self, token: &CancellationToken) -> Result<()> {
        tokio::select! {
            () = token.cancelled() => Err(BenchError::Cancelled),
            result = self.add() => result,
        }
    }

    /// Leave the group, freeing a slot and waking waiters when the active
    /// count reaches zero.
    pub fn done(&self) {
        self.inner.slots.add_permits(1);
        self.inner
            .active
            .send_modify(|count| *count = count.saturating_sub(1));
    }

    /// Suspend until the active count reaches zero.
    pub async fn wait(&self) {
        let mut rx = self.inner.active.subscribe();
        // The sender lives in `inner`, so this can only fail if every
        // handle is dropped, in which case nothing is active anyway.
        let _ = rx.wait_for(|count| *count == 0).await;
    }

    /// Current number of active members.
    #[must_use]
    pub fn active(&self) -> usize {
        *self.inner.active.borrow()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn add_blocks_at_limit() {
        let wg = LimitWaitGroup::new(2);
        wg.add().await.unwrap();
        wg.add().await.unwrap();
        assert_eq!(wg.active(), 2);

        // Third add must not complete while both slots are held.
        let blocked = timeout(Duration::from_millis(50), wg.add()).await;
        assert!(blocked.is_err());

        wg.done();
        wg.add().await.unwrap();
        assert_eq!(wg.active(), 2);
    }

    #[tokio::test]
    async fn add_with_cancel_returns_on_cancellation() {
        let wg = LimitWaitGroup::new(1);
        wg.add().await.unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let err = wg.add_with_cancel(&token).await.unwrap_err();
        assert!(matches!(err, BenchError::Cancelled));
    }

    #[tokio::test]
    async fn wait_resolves_when_all_members_leave() {
        let wg = LimitWaitGroup::new(4);
        for _ in 0..4 {
            wg.add().await.unwrap();
        }

        let waiter = {
            let wg = wg.clone();
            tokio::spawn(async move { wg.wait().await })
        };

        for _ in 0..4 {
            let wg = wg.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                wg.done();
            });
        }

        timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(wg.active(), 0);
    }

    #[tokio::test]
    async fn wait_with_no_members_returns_immediately() {
        let wg = LimitWaitGroup::new(8);
        timeout(Duration::from_millis(50), wg.wait()).await.unwrap();
    }
}
