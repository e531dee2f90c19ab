//! Scheduled auto-update driver.
//!
//! A periodic tick runs the feed tree's auto-update decision pass and emits
//! the due-feed batch for the external fetch pipeline. Structural tree
//! mutations and the tick pass share one process-wide [`UpdateLock`] with
//! try-acquire semantics: a contended caller fails fast, and a contended
//! tick logs and defers to the next pass instead of queuing.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::config::FeedsConfig;
use crate::tree::{FeedFormat, FeedTreeModel};

// ============================================================================
// Update Lock
// ============================================================================

/// Returned when another critical feed operation holds the update lock.
/// Advisory, not fatal — the caller may simply retry later.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("another critical feed operation is ongoing, try again later")]
pub struct LockContended;

/// Process-wide, non-reentrant lock gating structural tree mutations and the
/// scheduled update dispatch. Only `try`-style acquisition is offered; the
/// guard releases on every exit path.
#[derive(Debug, Default)]
pub struct UpdateLock {
    inner: tokio::sync::Mutex<()>,
}

/// Scoped guard for [`UpdateLock`].
pub struct UpdateGuard<'a> {
    _inner: tokio::sync::MutexGuard<'a, ()>,
}

impl UpdateLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fast-fail acquisition: never blocks.
    pub fn try_acquire(&self) -> Result<UpdateGuard<'_>, LockContended> {
        self.inner
            .try_lock()
            .map(|guard| UpdateGuard { _inner: guard })
            .map_err(|_| LockContended)
    }
}

// ============================================================================
// Update Requests
// ============================================================================

/// One feed the fetch pipeline should refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedUpdateRequest {
    pub feed_id: i64,
    pub title: String,
    pub url: String,
    pub format: FeedFormat,
}

// ============================================================================
// Scheduler
// ============================================================================

/// Maintains the global auto-update countdown and runs the decision pass.
///
/// Semantics of the countdown mirror the per-feed specific intervals: every
/// pass decrements the remaining counter, a lapsed counter resets to the
/// configured interval, and feeds in global mode are due exactly on the pass
/// where the counter sits at zero.
pub struct UpdateScheduler {
    lock: Arc<UpdateLock>,
    tx: mpsc::UnboundedSender<Vec<FeedUpdateRequest>>,
    enabled: bool,
    initial_interval: i64,
    remaining_interval: i64,
}

impl UpdateScheduler {
    pub fn new(
        config: &FeedsConfig,
        lock: Arc<UpdateLock>,
        tx: mpsc::UnboundedSender<Vec<FeedUpdateRequest>>,
    ) -> Self {
        Self {
            lock,
            tx,
            enabled: config.auto_update_enabled,
            initial_interval: config.auto_update_interval.max(1),
            remaining_interval: config.auto_update_interval.max(1),
        }
    }

    /// Run one decision pass. Backs off (log + defer) when the update lock
    /// is contended. Returns the emitted batch for callers driving ticks
    /// manually.
    pub fn tick(&mut self, tree: &mut FeedTreeModel) -> Vec<FeedUpdateRequest> {
        let guard = match self.lock.try_acquire() {
            Ok(guard) => guard,
            Err(LockContended) => {
                debug!("deferring scheduled feed auto-update, another critical operation is ongoing");
                return Vec::new();
            }
        };

        if self.enabled {
            self.remaining_interval -= 1;
            if self.remaining_interval < 0 {
                self.remaining_interval = self.initial_interval;
            }
        }

        let auto_update_now = self.enabled && self.remaining_interval == 0;
        debug!(
            pass = self.remaining_interval,
            of = self.initial_interval,
            auto_update_now,
            "running auto-update decision pass"
        );

        let due = tree.feeds_for_scheduled_update(auto_update_now);
        let requests = tree.update_requests(&due);
        drop(guard);

        if !requests.is_empty() {
            // Receiver gone means the fetch pipeline shut down; nothing to do.
            let _ = self.tx.send(requests.clone());
        }

        requests
    }

    /// Periodic driver: ticks every `period` until the request receiver is
    /// dropped. The tree is shared behind a tokio mutex because ticks and
    /// user-triggered mutations come from the same cooperative runtime.
    pub async fn run(mut self, tree: Arc<tokio::sync::Mutex<FeedTreeModel>>, period: Duration) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if self.tx.is_closed() {
                debug!("update request channel closed, stopping scheduler");
                return;
            }
            let mut tree = tree.lock().await;
            self.tick(&mut tree);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_fails_while_held() {
        let lock = UpdateLock::new();
        let guard = lock.try_acquire().unwrap();
        assert_eq!(lock.try_acquire().err(), Some(LockContended));
        drop(guard);
        assert!(lock.try_acquire().is_ok());
    }
}
