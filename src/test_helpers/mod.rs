// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use chrono::{DateTime, Utc};
use tempfile::TempDir;

use crate::config::Config;
use crate::queue::models::{DeadAction, QueuedAction};
use crate::queue::{QueueError, QueueStore, SqliteQueueStore};
use crate::replay::{ReplayError, ReplayResponse, Replayer};
use crate::sync::notifier::{SyncEvent, SyncNotifier};

/// Create a SQLite queue store in a fresh temporary directory.
/// Keep the returned directory alive for as long as the store is used.
pub async fn setup_test_queue_store() -> (SqliteQueueStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let store = SqliteQueueStore::new(&temp_dir.path().join("queue.db"))
        .await
        .expect("Failed to open test queue");
    (store, temp_dir)
}

/// Create a test configuration with temporary paths
pub fn create_test_config() -> Config {
    let temp_dir = std::env::temp_dir().join(format!("medsync-test-{}", uuid::Uuid::new_v4()));

    Config {
        queue_db_path: temp_dir.join("queue.db"),
        backend_api_url: "https://api.example.com".to_string(),
        app_origin: "https://app.example.com".to_string(),
        local_api_bind: "127.0.0.1:0".parse().unwrap(),
        settle_delay_secs: 0,
        log_level: "error".to_string(),
        ..Config::default()
    }
}

enum Script {
    Statuses(Mutex<VecDeque<u16>>),
    Always(u16),
    Unreachable,
}

/// Replayer that answers from a script and records the order of calls.
pub struct ScriptedReplayer {
    script: Script,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedReplayer {
    fn build(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            delay: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Answer with each status in turn, then 200
    pub fn with_statuses(statuses: &[u16]) -> Arc<Self> {
        Self::build(Script::Statuses(Mutex::new(statuses.iter().copied().collect())))
    }

    pub fn always(status: u16) -> Arc<Self> {
        Self::build(Script::Always(status))
    }

    /// Fail every call as if the backend could not be reached
    pub fn unreachable() -> Arc<Self> {
        Self::build(Script::Unreachable)
    }

    /// Answer `status` after sleeping for `delay`
    pub fn slow(status: u16, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Script::Always(status),
            delay: Some(delay),
            calls: Mutex::new(Vec::new()),
        })
    }

    /// Action ids in the order they were replayed
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Replayer for ScriptedReplayer {
    async fn replay(&self, action: &QueuedAction) -> Result<ReplayResponse, ReplayError> {
        self.calls.lock().unwrap().push(action.id.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let status = match &self.script {
            Script::Statuses(queue) => queue.lock().unwrap().pop_front().unwrap_or(200),
            Script::Always(status) => *status,
            Script::Unreachable => {
                // Nothing listens on the discard port, so this yields a real transport error
                let err = reqwest::Client::new()
                    .get("http://127.0.0.1:9/")
                    .send()
                    .await
                    .expect_err("discard port should refuse connections");
                return Err(ReplayError::Transport(err));
            }
        };

        Ok(ReplayResponse {
            status,
            body: String::new(),
            content_type: None,
        })
    }
}

/// Notifier that keeps every event it receives
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<SyncEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl SyncNotifier for RecordingNotifier {
    fn notify(&self, event: SyncEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Queue store held in memory. Every operation completes without touching a
/// blocking thread, which keeps tests on a paused clock deterministic.
#[derive(Default)]
pub struct MemoryQueueStore {
    pending: Mutex<Vec<QueuedAction>>,
    dead: Mutex<Vec<DeadAction>>,
    remove_budget: Mutex<Option<usize>>,
}

impl MemoryQueueStore {
    /// Let `n` removals succeed, then fail every later one with a storage error
    pub fn fail_removes_after(&self, n: usize) {
        *self.remove_budget.lock().unwrap() = Some(n);
    }

    fn retire(&self, action: QueuedAction, reason: &str) {
        self.dead.lock().unwrap().insert(
            0,
            DeadAction {
                action,
                reason: reason.to_string(),
                retired_at: Utc::now(),
            },
        );
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn enqueue(&self, action: &QueuedAction) -> Result<(), QueueError> {
        self.pending.lock().unwrap().push(action.clone());
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<QueuedAction>, QueueError> {
        Ok(self.pending.lock().unwrap().clone())
    }

    async fn remove(&self, id: &str) -> Result<bool, QueueError> {
        if let Some(budget) = self.remove_budget.lock().unwrap().as_mut() {
            if *budget == 0 {
                return Err(QueueError::Storage(sqlx::Error::PoolClosed));
            }
            *budget -= 1;
        }
        let mut pending = self.pending.lock().unwrap();
        let before = pending.len();
        pending.retain(|a| a.id != id);
        Ok(pending.len() != before)
    }

    async fn pending_count(&self) -> Result<u64, QueueError> {
        Ok(self.pending.lock().unwrap().len() as u64)
    }

    async fn record_failure(&self, id: &str, error: &str) -> Result<u32, QueueError> {
        let mut pending = self.pending.lock().unwrap();
        match pending.iter_mut().find(|a| a.id == id) {
            Some(action) => {
                action.attempts += 1;
                action.last_error = Some(error.to_string());
                Ok(action.attempts)
            }
            None => Ok(0),
        }
    }

    async fn dead_letter(&self, id: &str, reason: &str) -> Result<(), QueueError> {
        let removed = {
            let mut pending = self.pending.lock().unwrap();
            pending.iter().position(|a| a.id == id).map(|i| pending.remove(i))
        };
        if let Some(action) = removed {
            self.retire(action, reason);
        }
        Ok(())
    }

    async fn prune_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError> {
        let expired: Vec<QueuedAction> = {
            let mut pending = self.pending.lock().unwrap();
            let (expired, kept): (Vec<_>, Vec<_>) = pending.drain(..).partition(|a| a.enqueued_at < cutoff);
            *pending = kept;
            expired
        };
        let count = expired.len() as u64;
        for action in expired {
            self.retire(action, "expired");
        }
        Ok(count)
    }

    async fn list_dead(&self) -> Result<Vec<DeadAction>, QueueError> {
        Ok(self.dead.lock().unwrap().clone())
    }
}
