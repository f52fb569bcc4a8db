// SPDX-License-Identifier: GPL-3.0-only
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("queue storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("queue serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("corrupt queue entry {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("invalid action: {0}")]
    InvalidAction(String),
}
