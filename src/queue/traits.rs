// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::queue::error::QueueError;
use crate::queue::models::{DeadAction, QueuedAction};

/// Durable FIFO storage for queued actions.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Append an action to the tail of the queue
    async fn enqueue(&self, action: &QueuedAction) -> Result<(), QueueError>;

    /// All pending actions in insertion order
    async fn list_pending(&self) -> Result<Vec<QueuedAction>, QueueError>;

    /// Remove an action; returns whether a row was deleted
    async fn remove(&self, id: &str) -> Result<bool, QueueError>;

    /// Number of pending actions, read from storage
    async fn pending_count(&self) -> Result<u64, QueueError>;

    /// Record a failed replay and return the new attempt count
    async fn record_failure(&self, id: &str, error: &str) -> Result<u32, QueueError>;

    /// Move an action to the dead-letter table
    async fn dead_letter(&self, id: &str, reason: &str) -> Result<(), QueueError>;

    /// Dead-letter every action captured before `cutoff`; returns how many moved
    async fn prune_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError>;

    /// Retired actions, most recent first
    async fn list_dead(&self) -> Result<Vec<DeadAction>, QueueError>;
}
