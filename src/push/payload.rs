// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const DEFAULT_ICON: &str = "/icons/icon-192x192.png";
pub const DEFAULT_BADGE: &str = "/icons/badge-72x72.png";
pub const DEFAULT_TAG: &str = "medication-reminder";

const FALLBACK_TITLE: &str = "MedTracker";
const FALLBACK_BODY: &str = "You have a new notification";

#[derive(Debug, Error)]
pub enum PushError {
    #[error("invalid push payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("push payload is missing {0}")]
    MissingField(&'static str),

    #[error("invalid notification target: {0}")]
    InvalidTarget(String),

    #[error("notification platform error: {0}")]
    Platform(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Push message as sent by the backend. Only `title` and `body` are required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushPayload {
    pub title: String,
    pub body: String,
    pub icon: Option<String>,
    pub badge: Option<String>,
    pub tag: Option<String>,
    pub data: Option<Value>,
    pub require_interaction: Option<bool>,
    pub actions: Option<Vec<NotificationAction>>,
}

/// A notification ready for display, every option filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub icon: String,
    pub badge: String,
    pub tag: String,
    pub data: Value,
    pub require_interaction: bool,
    pub actions: Vec<NotificationAction>,
}

impl Notification {
    fn fallback() -> Self {
        Self::from(PushPayload {
            title: FALLBACK_TITLE.to_string(),
            body: FALLBACK_BODY.to_string(),
            icon: None,
            badge: None,
            tag: None,
            data: None,
            require_interaction: None,
            actions: None,
        })
    }
}

impl From<PushPayload> for Notification {
    fn from(payload: PushPayload) -> Self {
        let data = match payload.data {
            Some(Value::Null) | None => Value::Object(Default::default()),
            Some(data) => data,
        };

        Self {
            title: payload.title,
            body: payload.body,
            icon: payload.icon.unwrap_or_else(|| DEFAULT_ICON.to_string()),
            badge: payload.badge.unwrap_or_else(|| DEFAULT_BADGE.to_string()),
            tag: payload.tag.unwrap_or_else(|| DEFAULT_TAG.to_string()),
            data,
            require_interaction: payload.require_interaction.unwrap_or(false),
            actions: payload.actions.unwrap_or_default(),
        }
    }
}

/// Turn raw push data into a displayable notification.
///
/// A push without data still shows something; malformed data is an error.
pub fn parse_push_data(data: Option<&[u8]>) -> Result<Notification, PushError> {
    let bytes = match data {
        Some(bytes) if !bytes.iter().all(u8::is_ascii_whitespace) => bytes,
        _ => return Ok(Notification::fallback()),
    };

    let payload: PushPayload = serde_json::from_slice(bytes)?;
    if payload.title.trim().is_empty() {
        return Err(PushError::MissingField("title"));
    }
    if payload.body.trim().is_empty() {
        return Err(PushError::MissingField("body"));
    }

    Ok(payload.into())
}
