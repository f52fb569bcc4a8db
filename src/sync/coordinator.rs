// SPDX-License-Identifier: GPL-3.0-only
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::connectivity::ConnectivityMonitor;
use crate::queue::{OfflineQueue, QueueError, SyncResult};
use crate::sync::background::BackgroundSync;
use crate::sync::notifier::{SyncEvent, SyncNotifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPhase {
    Idle,
    Syncing,
}

pub type CompletionCallback = Box<dyn Fn(SyncResult) + Send + Sync>;

/// Resets the in-flight flag however the sync run ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Decides when the offline queue is drained.
///
/// One sync per offline→online transition, after a settle delay, with at
/// most one sync in flight at any time.
pub struct SyncCoordinator {
    queue: Arc<OfflineQueue>,
    notifier: Arc<dyn SyncNotifier>,
    background: Arc<BackgroundSync>,
    settle_delay: Duration,
    syncing: AtomicBool,
    attempted_this_session: AtomicBool,
    on_complete: Option<CompletionCallback>,
}

impl SyncCoordinator {
    pub fn new(
        queue: Arc<OfflineQueue>,
        notifier: Arc<dyn SyncNotifier>,
        background: Arc<BackgroundSync>,
        settle_delay: Duration,
    ) -> Self {
        Self {
            queue,
            notifier,
            background,
            settle_delay,
            syncing: AtomicBool::new(false),
            attempted_this_session: AtomicBool::new(false),
            on_complete: None,
        }
    }

    /// Called after every run that replayed at least one action successfully
    pub fn with_completion(mut self, callback: CompletionCallback) -> Self {
        self.on_complete = Some(callback);
        self
    }

    pub fn phase(&self) -> SyncPhase {
        if self.syncing.load(Ordering::Acquire) {
            SyncPhase::Syncing
        } else {
            SyncPhase::Idle
        }
    }

    /// Run one guarded sync.
    ///
    /// Returns `None` when the call was coalesced into a sync already in
    /// flight, or when nothing was pending.
    pub async fn sync_once(&self) -> Result<Option<SyncResult>, QueueError> {
        if self
            .syncing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Sync already in flight, request coalesced");
            return Ok(None);
        }
        let _in_flight = InFlight(&self.syncing);

        let pending = self.queue.pending_count().await?;
        if pending == 0 {
            debug!("Nothing queued, skipping sync");
            return Ok(None);
        }

        self.notifier.notify(SyncEvent::Syncing { pending });

        let result = match self.queue.sync_all().await {
            Ok(result) => result,
            Err(e) => {
                // Whatever was replayed before the error is already gone
                let unsynced = self.queue.pending_count().await.unwrap_or(pending);
                self.notifier.notify(SyncEvent::SyncFailed { count: unsynced });
                return Err(e);
            }
        };

        if result.success > 0 {
            self.notifier.notify(SyncEvent::Synced { count: u64::from(result.success) });
            if let Some(ref callback) = self.on_complete {
                callback(result);
            }
        }
        if result.failed > 0 {
            self.notifier.notify(SyncEvent::SyncFailed { count: u64::from(result.failed) });
        }

        Ok(Some(result))
    }

    async fn run_sync(&self, reason: &str) {
        info!(reason, "Starting sync");
        if let Err(e) = self.sync_once().await {
            error!(error = %e, reason, "Sync aborted by a storage error");
        }
        let drained = self.background.take_tags();
        if !drained.is_empty() {
            debug!(tags = ?drained, "Background sync registrations served");
        }
    }

    /// Follow the connectivity state forever, syncing on reconnect and on
    /// background sync wake-ups.
    pub async fn run(self: Arc<Self>, monitor: Arc<ConnectivityMonitor>) {
        let mut rx = monitor.subscribe();

        loop {
            let state = *rx.borrow_and_update();

            if !state.is_online {
                self.attempted_this_session.store(false, Ordering::Release);
            } else if state.was_offline && !self.attempted_this_session.swap(true, Ordering::AcqRel) {
                tokio::time::sleep(self.settle_delay).await;

                if monitor.current().is_online {
                    monitor.clear_was_offline();
                    self.run_sync("connectivity restored").await;
                    // was_offline set again means a whole offline period passed mid-sync
                    if monitor.current().was_offline {
                        debug!("Connection dropped and returned during sync");
                        self.attempted_this_session.store(false, Ordering::Release);
                    }
                } else {
                    debug!("Connection dropped during settle delay");
                    self.attempted_this_session.store(false, Ordering::Release);
                }
                // The state may have moved while we slept or synced
                continue;
            }

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.background.woken() => {
                    if monitor.current().is_online {
                        self.run_sync("background sync").await;
                    } else {
                        debug!("Background sync deferred until connectivity returns");
                    }
                }
            }
        }
    }
}
