// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use thiserror::Error;
use crate::queue::models::QueuedAction;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

/// Response the backend gave to a replayed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayResponse {
    pub status: u16,
    pub body: String,
    pub content_type: Option<String>,
}

impl ReplayResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Statuses worth retrying later rather than reporting to the caller
    pub fn is_transient(&self) -> bool {
        matches!(self.status, 408 | 429) || self.status >= 500
    }
}

#[async_trait]
pub trait Replayer: Send + Sync {
    /// Issue the captured request exactly as stored
    async fn replay(&self, action: &QueuedAction) -> Result<ReplayResponse, ReplayError>;
}
