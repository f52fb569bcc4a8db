// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use url::Url;

use crate::push::payload::PushError;
use crate::utils::{resolve_app_url, same_origin};

pub const DEFAULT_CLICK_TARGET: &str = "/dashboard";

/// An open UI window as last reported by the window itself
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientWindow {
    pub id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClickAction {
    FocusExisting { window_id: String, url: String },
    OpenWindow { url: String },
}

/// Where a click on a notification carrying `data` should lead.
///
/// `data.url` wins when it stays on the app origin; anything else lands on
/// the dashboard.
pub fn click_target(data: &Value, app_origin: &Url) -> Result<Url, PushError> {
    if let Some(target) = data.get("url").and_then(Value::as_str) {
        match resolve_app_url(app_origin, target) {
            Ok(url) => return Ok(url),
            Err(e) => warn!(requested = target, error = %e, "Ignoring notification target"),
        }
    }

    resolve_app_url(app_origin, DEFAULT_CLICK_TARGET).map_err(|e| PushError::InvalidTarget(e.to_string()))
}

/// Pick the first open window on the app origin, or ask for a new one.
pub fn route_click(data: &Value, app_origin: &Url, windows: &[ClientWindow]) -> Result<ClickAction, PushError> {
    let target = click_target(data, app_origin)?;

    let existing = windows.iter().find(|window| {
        Url::parse(&window.url)
            .map(|url| same_origin(&url, app_origin))
            .unwrap_or(false)
    });

    Ok(match existing {
        Some(window) => ClickAction::FocusExisting {
            window_id: window.id.clone(),
            url: target.to_string(),
        },
        None => ClickAction::OpenWindow { url: target.to_string() },
    })
}
