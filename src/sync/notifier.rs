// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// User-facing sync progress, rendered by the UI as transient toasts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyncEvent {
    Syncing { pending: u64 },
    Synced { count: u64 },
    SyncFailed { count: u64 },
}

pub trait SyncNotifier: Send + Sync {
    fn notify(&self, event: SyncEvent);
}

/// Notifier for headless runs: events only reach the log.
pub struct LogNotifier;

impl SyncNotifier for LogNotifier {
    fn notify(&self, event: SyncEvent) {
        match event {
            SyncEvent::Syncing { pending } => info!(pending, "Syncing offline changes"),
            SyncEvent::Synced { count } => info!(count, "Offline changes synced"),
            SyncEvent::SyncFailed { count } => warn!(count, "Some offline changes failed to sync"),
        }
    }
}
