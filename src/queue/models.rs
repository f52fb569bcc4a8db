// SPDX-License-Identifier: GPL-3.0-only
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A captured mutating request waiting to be replayed against the backend.
///
/// The request fields are frozen at capture time; replay sends them unchanged.
/// Only the bookkeeping fields (`attempts`, `last_error`) move afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Unique identifier (UUID v4)
    pub id: String,

    /// Absolute target URL
    pub url: String,

    /// HTTP verb, upper-case
    pub method: String,

    /// Header name to value, as captured
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Opaque request payload
    #[serde(default)]
    pub body: Option<String>,

    /// Capture timestamp
    pub enqueued_at: DateTime<Utc>,

    /// Failed replay attempts so far
    #[serde(default)]
    pub attempts: u32,

    /// Error from the most recent failed replay
    #[serde(default)]
    pub last_error: Option<String>,
}

impl QueuedAction {
    pub fn new(
        method: impl Into<String>,
        url: impl Into<String>,
        headers: BTreeMap<String, String>,
        body: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            url: url.into(),
            method: method.into().to_ascii_uppercase(),
            headers,
            body,
            enqueued_at: Utc::now(),
            attempts: 0,
            last_error: None,
        }
    }
}

/// Request descriptor submitted by a UI client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
}

impl From<ActionRequest> for QueuedAction {
    fn from(request: ActionRequest) -> Self {
        QueuedAction::new(request.method, request.url, request.headers, request.body)
    }
}

/// An action retired from the queue after exhausting its retry budget or TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadAction {
    #[serde(flatten)]
    pub action: QueuedAction,
    pub reason: String,
    pub retired_at: DateTime<Utc>,
}

/// Outcome of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    pub success: u32,
    pub failed: u32,
}

impl SyncResult {
    pub fn total(&self) -> u32 {
        self.success + self.failed
    }
}
