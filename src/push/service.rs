// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

use crate::push::click::{route_click, ClickAction, ClientWindow};
use crate::push::payload::{parse_push_data, Notification, PushError};

/// Where notifications are shown and windows are driven.
pub trait NotificationPlatform: Send + Sync {
    fn show(&self, notification: &Notification) -> Result<(), PushError>;

    fn close(&self, tag: &str);

    fn list_windows(&self) -> Vec<ClientWindow>;

    fn navigate_and_focus(&self, window_id: &str, url: &str) -> Result<(), PushError>;

    fn open_window(&self, url: &str) -> Result<(), PushError>;

    fn subscription_changed(&self);
}

#[derive(Debug, Clone, Serialize)]
pub struct PushDelivery {
    pub notification: Notification,
    pub displayed: bool,
}

/// A click on a displayed notification
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationClick {
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub data: Value,
}

pub struct PushHandler {
    platform: Arc<dyn NotificationPlatform>,
    app_origin: Url,
}

impl PushHandler {
    pub fn new(platform: Arc<dyn NotificationPlatform>, app_origin: Url) -> Self {
        Self { platform, app_origin }
    }

    /// Display an inbound push.
    ///
    /// A display failure is logged and reported through `displayed`; only
    /// a malformed payload is an error.
    pub fn handle_push(&self, data: Option<&[u8]>) -> Result<PushDelivery, PushError> {
        let notification = parse_push_data(data).inspect_err(|e| warn!(error = %e, "Dropping push message"))?;

        let displayed = match self.platform.show(&notification) {
            Ok(()) => {
                info!(tag = %notification.tag, title = %notification.title, "Notification displayed");
                true
            }
            Err(e) => {
                warn!(tag = %notification.tag, error = %e, "Notification could not be displayed");
                false
            }
        };

        Ok(PushDelivery { notification, displayed })
    }

    pub fn handle_click(&self, click: &NotificationClick) -> Result<ClickAction, PushError> {
        if let Some(ref tag) = click.tag {
            self.platform.close(tag);
        }

        let data = if click.data.is_null() { Value::Object(Default::default()) } else { click.data.clone() };
        let action = route_click(&data, &self.app_origin, &self.platform.list_windows())?;

        match action {
            ClickAction::FocusExisting { ref window_id, ref url } => {
                if let Err(e) = self.platform.navigate_and_focus(window_id, url) {
                    // The window went away between listing and navigating
                    warn!(window_id = %window_id, error = %e, "Could not focus window, opening a new one");
                    self.platform.open_window(url)?;
                    return Ok(ClickAction::OpenWindow { url: url.clone() });
                }
                info!(window_id = %window_id, url = %url, action = ?click.action, "Notification click focused window");
            }
            ClickAction::OpenWindow { ref url } => {
                self.platform.open_window(url)?;
                info!(url = %url, action = ?click.action, "Notification click opened window");
            }
        }

        Ok(action)
    }

    /// The push subscription was invalidated. Windows are told; they decide
    /// whether to subscribe again.
    pub fn handle_subscription_change(&self) {
        info!("Push subscription changed");
        self.platform.subscription_changed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakePlatform {
        windows: Vec<ClientWindow>,
        fail_show: bool,
        fail_navigate: bool,
        log: Mutex<Vec<String>>,
    }

    impl FakePlatform {
        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl NotificationPlatform for FakePlatform {
        fn show(&self, notification: &Notification) -> Result<(), PushError> {
            if self.fail_show {
                return Err(PushError::Platform("no display".into()));
            }
            self.log.lock().unwrap().push(format!("show {}", notification.tag));
            Ok(())
        }

        fn close(&self, tag: &str) {
            self.log.lock().unwrap().push(format!("close {}", tag));
        }

        fn list_windows(&self) -> Vec<ClientWindow> {
            self.windows.clone()
        }

        fn navigate_and_focus(&self, window_id: &str, url: &str) -> Result<(), PushError> {
            if self.fail_navigate {
                return Err(PushError::Platform("window closed".into()));
            }
            self.log.lock().unwrap().push(format!("navigate {} {}", window_id, url));
            Ok(())
        }

        fn open_window(&self, url: &str) -> Result<(), PushError> {
            self.log.lock().unwrap().push(format!("open {}", url));
            Ok(())
        }

        fn subscription_changed(&self) {
            self.log.lock().unwrap().push("subscription".into());
        }
    }

    fn handler(platform: Arc<FakePlatform>) -> PushHandler {
        PushHandler::new(platform, Url::parse("https://app.example.com").unwrap())
    }

    #[test]
    fn test_push_is_displayed_with_defaults() {
        let platform = Arc::new(FakePlatform::default());
        let delivery = handler(platform.clone())
            .handle_push(Some(br#"{"title":"Dose due","body":"Take Metformin 500mg"}"#))
            .unwrap();

        assert!(delivery.displayed);
        assert_eq!(delivery.notification.icon, "/icons/icon-192x192.png");
        assert_eq!(platform.log(), vec!["show medication-reminder"]);
    }

    #[test]
    fn test_display_failure_is_soft() {
        let platform = Arc::new(FakePlatform {
            fail_show: true,
            ..Default::default()
        });
        let delivery = handler(platform).handle_push(None).unwrap();
        assert!(!delivery.displayed);
        assert_eq!(delivery.notification.title, "MedTracker");
    }

    #[test]
    fn test_malformed_push_is_error() {
        let platform = Arc::new(FakePlatform::default());
        assert!(handler(platform.clone()).handle_push(Some(b"{")).is_err());
        assert!(platform.log().is_empty());
    }

    #[test]
    fn test_click_without_url_opens_dashboard() {
        let platform = Arc::new(FakePlatform::default());
        let click = NotificationClick {
            tag: Some("medication-reminder".into()),
            ..Default::default()
        };

        let action = handler(platform.clone()).handle_click(&click).unwrap();
        assert_eq!(
            action,
            ClickAction::OpenWindow {
                url: "https://app.example.com/dashboard".into()
            }
        );
        assert_eq!(
            platform.log(),
            vec!["close medication-reminder", "open https://app.example.com/dashboard"]
        );
    }

    #[test]
    fn test_click_focuses_open_window() {
        let platform = Arc::new(FakePlatform {
            windows: vec![ClientWindow {
                id: "w1".into(),
                url: "https://app.example.com/settings".into(),
            }],
            ..Default::default()
        });
        let click = NotificationClick {
            data: json!({"url": "/medications/3"}),
            ..Default::default()
        };

        handler(platform.clone()).handle_click(&click).unwrap();
        assert_eq!(platform.log(), vec!["navigate w1 https://app.example.com/medications/3"]);
    }

    #[test]
    fn test_click_falls_back_when_window_is_gone() {
        let platform = Arc::new(FakePlatform {
            windows: vec![ClientWindow {
                id: "w1".into(),
                url: "https://app.example.com/".into(),
            }],
            fail_navigate: true,
            ..Default::default()
        });

        let action = handler(platform.clone()).handle_click(&NotificationClick::default()).unwrap();
        assert!(matches!(action, ClickAction::OpenWindow { .. }));
        assert_eq!(platform.log(), vec!["open https://app.example.com/dashboard"]);
    }

    #[test]
    fn test_subscription_change_is_broadcast() {
        let platform = Arc::new(FakePlatform::default());
        handler(platform.clone()).handle_subscription_change();
        assert_eq!(platform.log(), vec!["subscription"]);
    }
}
