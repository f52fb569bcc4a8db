// SPDX-License-Identifier: GPL-3.0-only
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::queue::error::QueueError;
use crate::queue::models::{DeadAction, QueuedAction, SyncResult};
use crate::queue::traits::QueueStore;
use crate::replay::{ReplayError, ReplayResponse, Replayer};
use crate::sync::background::BackgroundSync;

/// Bounds on how long a failing action may stay queued.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Failed replays before the action is dead-lettered; 0 means unlimited
    pub max_attempts: u32,
    /// Age after which an action is dead-lettered without another attempt
    pub ttl: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

/// What happened to a request submitted through the agent.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// The backend accepted it
    Delivered { status: u16, body: String, content_type: Option<String> },
    /// The backend refused it; retrying would not help
    Rejected { status: u16, body: String, content_type: Option<String> },
    /// Buffered for replay once the backend is reachable
    Queued { action_id: String },
}

impl SubmitOutcome {
    fn delivered(response: ReplayResponse) -> Self {
        SubmitOutcome::Delivered {
            status: response.status,
            body: response.body,
            content_type: response.content_type,
        }
    }

    fn rejected(response: ReplayResponse) -> Self {
        SubmitOutcome::Rejected {
            status: response.status,
            body: response.body,
            content_type: response.content_type,
        }
    }
}

/// Offline action queue: durable buffering of mutating requests and their
/// in-order replay against the backend.
pub struct OfflineQueue {
    store: Arc<dyn QueueStore>,
    replayer: Arc<dyn Replayer>,
    background: Arc<BackgroundSync>,
    backend: Url,
    policy: RetryPolicy,
}

impl OfflineQueue {
    pub fn new(
        store: Arc<dyn QueueStore>,
        replayer: Arc<dyn Replayer>,
        background: Arc<BackgroundSync>,
        backend: Url,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            store,
            replayer,
            background,
            backend,
            policy,
        }
    }

    fn validate(&self, action: &QueuedAction) -> Result<(), QueueError> {
        reqwest::Method::from_bytes(action.method.as_bytes())
            .map_err(|_| QueueError::InvalidAction(format!("invalid HTTP method: {}", action.method)))?;
        crate::utils::validate_backend_url(&action.url, &self.backend)
            .map_err(|e| QueueError::InvalidAction(e.to_string()))?;
        Ok(())
    }

    /// Append an action to durable storage. Storage failures are returned,
    /// never dropped.
    pub async fn enqueue(&self, action: QueuedAction) -> Result<QueuedAction, QueueError> {
        self.validate(&action)?;
        self.store.enqueue(&action).await?;
        Ok(action)
    }

    pub async fn pending_count(&self) -> Result<u64, QueueError> {
        self.store.pending_count().await
    }

    pub async fn list_pending(&self) -> Result<Vec<QueuedAction>, QueueError> {
        self.store.list_pending().await
    }

    pub async fn remove(&self, id: &str) -> Result<bool, QueueError> {
        self.store.remove(id).await
    }

    pub async fn list_dead(&self) -> Result<Vec<DeadAction>, QueueError> {
        self.store.list_dead().await
    }

    /// Send a request now, or queue it if the backend cannot take it.
    ///
    /// Offline, transport errors, 408, 429 and 5xx all end up queued. Any
    /// other response goes straight back to the caller.
    pub async fn submit(&self, action: QueuedAction, online: bool) -> Result<SubmitOutcome, QueueError> {
        self.validate(&action)?;

        if !online {
            info!(method = %action.method, url = %action.url, "Offline, queueing request");
            let action = self.enqueue(action).await?;
            return Ok(SubmitOutcome::Queued { action_id: action.id });
        }

        match self.replayer.replay(&action).await {
            Ok(response) if response.is_success() => Ok(SubmitOutcome::delivered(response)),
            Ok(response) if response.is_transient() => {
                warn!(status = response.status, url = %action.url, "Transient backend failure, queueing request");
                let action = self.enqueue(action).await?;
                Ok(SubmitOutcome::Queued { action_id: action.id })
            }
            Ok(response) => Ok(SubmitOutcome::rejected(response)),
            Err(ReplayError::Transport(e)) => {
                warn!(error = %e, url = %action.url, "Backend unreachable, queueing request");
                let action = self.enqueue(action).await?;
                Ok(SubmitOutcome::Queued { action_id: action.id })
            }
            Err(e) => Err(QueueError::InvalidAction(e.to_string())),
        }
    }

    /// Replay every queued action in FIFO order.
    ///
    /// Each action is attempted exactly once; a failed action stays queued
    /// (or is dead-lettered once over the retry cap) and the run moves on.
    /// Expired actions are retired before the run and are not counted.
    pub async fn sync_all(&self) -> Result<SyncResult, QueueError> {
        let cutoff = chrono::Duration::from_std(self.policy.ttl)
            .ok()
            .and_then(|ttl| Utc::now().checked_sub_signed(ttl));
        if let Some(cutoff) = cutoff {
            self.store.prune_expired(cutoff).await?;
        }

        let pending = self.store.list_pending().await?;
        let mut result = SyncResult::default();

        info!(count = pending.len(), "Replaying queued actions");

        for action in &pending {
            let failure = match self.replayer.replay(action).await {
                Ok(response) if response.is_success() => None,
                Ok(response) => Some(format!("HTTP {}", response.status)),
                Err(e) => Some(e.to_string()),
            };

            match failure {
                None => {
                    self.store.remove(&action.id).await?;
                    result.success += 1;
                }
                Some(error) => {
                    warn!(action_id = %action.id, error = %error, "Replay failed, keeping action queued");
                    self.record_failure(action, &error).await?;
                    result.failed += 1;
                }
            }
        }

        info!(success = result.success, failed = result.failed, "Queue replay finished");
        Ok(result)
    }

    async fn record_failure(&self, action: &QueuedAction, error: &str) -> Result<(), QueueError> {
        let attempts = self.store.record_failure(&action.id, error).await?;
        if self.policy.max_attempts > 0 && attempts >= self.policy.max_attempts {
            let reason = format!("retry limit reached after {} attempts: {}", attempts, error);
            self.store.dead_letter(&action.id, &reason).await?;
        }
        Ok(())
    }

    /// Ask for a wake-up once connectivity returns. Never fails: an
    /// unsupported or rejected registration is only logged.
    pub fn request_background_sync(&self, tag: &str) {
        match self.background.register(tag) {
            Ok(()) => info!(tag = %tag, "Background sync requested"),
            Err(e) => warn!(tag = %tag, error = %e, "Background sync registration ignored"),
        }
    }
}
