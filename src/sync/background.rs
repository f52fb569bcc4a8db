// SPDX-License-Identifier: GPL-3.0-only
use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::Notify;
use tracing::debug;

const MAX_TAG_LENGTH: usize = 128;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BackgroundSyncError {
    #[error("background sync is not supported")]
    Unsupported,

    #[error("invalid sync tag: {0}")]
    InvalidTag(String),
}

/// Registered wake-up requests.
///
/// A registration wakes the coordinator so the queue is drained as soon as
/// connectivity allows, without waiting for a UI window to ask. Tags are
/// opaque; registering the same tag twice is one registration.
pub struct BackgroundSync {
    enabled: bool,
    tags: Mutex<BTreeSet<String>>,
    wake: Notify,
}

impl BackgroundSync {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            tags: Mutex::new(BTreeSet::new()),
            wake: Notify::new(),
        }
    }

    pub fn register(&self, tag: &str) -> Result<(), BackgroundSyncError> {
        if !self.enabled {
            return Err(BackgroundSyncError::Unsupported);
        }

        let tag = tag.trim();
        if tag.is_empty() || tag.len() > MAX_TAG_LENGTH || tag.chars().any(char::is_control) {
            return Err(BackgroundSyncError::InvalidTag(tag.to_string()));
        }

        let inserted = self
            .tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(tag.to_string());
        debug!(tag = %tag, new = inserted, "Background sync registered");

        self.wake.notify_one();
        Ok(())
    }

    pub fn pending_tags(&self) -> Vec<String> {
        self.tags
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Clear and return all registered tags
    pub fn take_tags(&self) -> Vec<String> {
        let mut tags = self.tags.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *tags).into_iter().collect()
    }

    /// Resolves once a registration has happened since the last wake-up
    pub async fn woken(&self) {
        self.wake.notified().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_register_and_take() {
        let sync = BackgroundSync::new(true);
        sync.register("sync-medication-logs").unwrap();
        sync.register("sync-medication-logs").unwrap();
        sync.register("sync-reminders").unwrap();

        assert_eq!(sync.pending_tags(), vec!["sync-medication-logs", "sync-reminders"]);
        assert_eq!(sync.take_tags().len(), 2);
        assert!(sync.pending_tags().is_empty());
    }

    #[test]
    fn test_disabled_is_unsupported() {
        let sync = BackgroundSync::new(false);
        assert_eq!(sync.register("sync-medication-logs"), Err(BackgroundSyncError::Unsupported));
        assert!(sync.pending_tags().is_empty());
    }

    #[test]
    fn test_invalid_tags() {
        let sync = BackgroundSync::new(true);
        assert!(matches!(sync.register("   "), Err(BackgroundSyncError::InvalidTag(_))));
        assert!(matches!(sync.register(&"x".repeat(200)), Err(BackgroundSyncError::InvalidTag(_))));
        assert!(matches!(sync.register("bad\ntag"), Err(BackgroundSyncError::InvalidTag(_))));
    }

    #[tokio::test]
    async fn test_registration_before_wait_is_not_lost() {
        let sync = BackgroundSync::new(true);
        sync.register("sync-medication-logs").unwrap();

        tokio::time::timeout(Duration::from_secs(1), sync.woken())
            .await
            .expect("wake-up should already be pending");
    }
}
