// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::queue::error::QueueError;
use crate::queue::models::{DeadAction, QueuedAction};
use crate::queue::traits::QueueStore;

pub struct SqliteQueueStore {
    pool: SqlitePool,
}

/// Fixed-width UTC timestamps so that text comparison in SQL matches time order.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(id: &str, raw: &str) -> Result<DateTime<Utc>, QueueError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| QueueError::Corrupt {
            id: id.to_string(),
            reason: format!("bad timestamp '{}': {}", raw, e),
        })
}

impl SqliteQueueStore {
    pub async fn new(db_path: &Path) -> Result<Self, QueueError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.init_schema().await?;

        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), QueueError> {
        // seq gives the FIFO order; id is the public handle
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS queued_actions (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                url TEXT NOT NULL,
                method TEXT NOT NULL,
                headers TEXT NOT NULL,
                body TEXT,
                enqueued_at TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS dead_actions (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                method TEXT NOT NULL,
                headers TEXT NOT NULL,
                body TEXT,
                enqueued_at TEXT NOT NULL,
                attempts INTEGER NOT NULL,
                last_error TEXT,
                reason TEXT NOT NULL,
                retired_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        info!("Initialized SQLite offline queue schema");
        Ok(())
    }

    fn action_from_row(row: &SqliteRow) -> Result<QueuedAction, QueueError> {
        let id: String = row.try_get("id")?;
        let headers_json: String = row.try_get("headers")?;
        let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)
            .map_err(|e| QueueError::Corrupt {
                id: id.clone(),
                reason: format!("bad headers: {}", e),
            })?;
        let enqueued_at = parse_ts(&id, &row.try_get::<String, _>("enqueued_at")?)?;
        let attempts: i64 = row.try_get("attempts")?;

        Ok(QueuedAction {
            url: row.try_get("url")?,
            method: row.try_get("method")?,
            headers,
            body: row.try_get("body")?,
            enqueued_at,
            attempts: attempts.max(0) as u32,
            last_error: row.try_get("last_error")?,
            id,
        })
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn enqueue(&self, action: &QueuedAction) -> Result<(), QueueError> {
        let headers = serde_json::to_string(&action.headers)?;

        sqlx::query(
            r#"
            INSERT INTO queued_actions (id, url, method, headers, body, enqueued_at, attempts, last_error)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&action.id)
        .bind(&action.url)
        .bind(&action.method)
        .bind(headers)
        .bind(&action.body)
        .bind(format_ts(&action.enqueued_at))
        .bind(action.attempts as i64)
        .bind(&action.last_error)
        .execute(&self.pool)
        .await?;

        info!(action_id = %action.id, method = %action.method, url = %action.url, "Queued action");
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<QueuedAction>, QueueError> {
        let rows = sqlx::query("SELECT * FROM queued_actions ORDER BY seq ASC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::action_from_row).collect()
    }

    async fn remove(&self, id: &str) -> Result<bool, QueueError> {
        let result = sqlx::query("DELETE FROM queued_actions WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(action_id = %id, "Removed action from queue");
        }
        Ok(removed)
    }

    async fn pending_count(&self) -> Result<u64, QueueError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queued_actions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as u64)
    }

    async fn record_failure(&self, id: &str, error: &str) -> Result<u32, QueueError> {
        let attempts: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE queued_actions
            SET attempts = attempts + 1, last_error = ?2
            WHERE id = ?1
            RETURNING attempts
            "#,
        )
        .bind(id)
        .bind(error)
        .fetch_optional(&self.pool)
        .await?;

        match attempts {
            Some(n) => Ok(n.max(0) as u32),
            None => {
                warn!(action_id = %id, "Failure recorded for action no longer in queue");
                Ok(0)
            }
        }
    }

    async fn dead_letter(&self, id: &str, reason: &str) -> Result<(), QueueError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO dead_actions
                (id, url, method, headers, body, enqueued_at, attempts, last_error, reason, retired_at)
            SELECT id, url, method, headers, body, enqueued_at, attempts, last_error, ?2, ?3
            FROM queued_actions WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(reason)
        .bind(format_ts(&Utc::now()))
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM queued_actions WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        warn!(action_id = %id, reason = %reason, "Moved action to dead-letter table");
        Ok(())
    }

    async fn prune_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, QueueError> {
        let cutoff = format_ts(&cutoff);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO dead_actions
                (id, url, method, headers, body, enqueued_at, attempts, last_error, reason, retired_at)
            SELECT id, url, method, headers, body, enqueued_at, attempts, last_error, 'expired', ?2
            FROM queued_actions WHERE enqueued_at < ?1
            "#,
        )
        .bind(&cutoff)
        .bind(format_ts(&Utc::now()))
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM queued_actions WHERE enqueued_at < ?1")
            .bind(&cutoff)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let pruned = result.rows_affected();
        if pruned > 0 {
            warn!(count = pruned, "Expired queued actions moved to dead-letter table");
        }
        Ok(pruned)
    }

    async fn list_dead(&self) -> Result<Vec<DeadAction>, QueueError> {
        let rows = sqlx::query("SELECT * FROM dead_actions ORDER BY retired_at DESC")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<DeadAction, QueueError> {
                let action = Self::action_from_row(row)?;
                let retired_at = parse_ts(&action.id, &row.try_get::<String, _>("retired_at")?)?;
                Ok(DeadAction {
                    reason: row.try_get("reason")?,
                    retired_at,
                    action,
                })
            })
            .collect()
    }
}
