// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;
use tracing::debug;

use crate::connectivity::{ConnectivityMonitor, ConnectivityState};
use crate::push::{ClientWindow, Notification, NotificationPlatform, PushError};
use crate::sync::{LogNotifier, SyncEvent, SyncNotifier};

const EVENT_CAPACITY: usize = 256;

/// Messages pushed to connected UI windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Sync(SyncEvent),
    Connectivity(ConnectivityState),
    Notification(Notification),
    CloseNotification { tag: String },
    Navigate { window_id: String, url: String },
    OpenWindow { url: String },
    PushSubscriptionChanged,
}

impl AgentEvent {
    /// Whether a given window should receive this event
    pub fn is_for(&self, window_id: &str) -> bool {
        match self {
            AgentEvent::Navigate { window_id: target, .. } => target == window_id,
            _ => true,
        }
    }
}

/// Fan-out of agent events plus the registry of open windows.
pub struct EventHub {
    tx: broadcast::Sender<AgentEvent>,
    windows: Mutex<BTreeMap<String, String>>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            tx,
            windows: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }

    /// Send to every subscriber; returns how many received it
    pub fn publish(&self, event: AgentEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                debug!("No window connected, event dropped");
                0
            }
        }
    }

    pub fn register_window(&self, id: &str, url: &str) {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), url.to_string());
    }

    pub fn unregister_window(&self, id: &str) {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).remove(id);
    }

    /// Relay every connectivity change to the windows
    pub async fn forward_connectivity(self: Arc<Self>, monitor: Arc<ConnectivityMonitor>) {
        let mut rx = monitor.subscribe();
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            self.publish(AgentEvent::Connectivity(state));
        }
    }

    fn has_window(&self, id: &str) -> bool {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncNotifier for EventHub {
    fn notify(&self, event: SyncEvent) {
        LogNotifier.notify(event.clone());
        self.publish(AgentEvent::Sync(event));
    }
}

impl NotificationPlatform for EventHub {
    fn show(&self, notification: &Notification) -> Result<(), PushError> {
        if self.publish(AgentEvent::Notification(notification.clone())) == 0 {
            return Err(PushError::Platform("no window connected to display notifications".to_string()));
        }
        Ok(())
    }

    fn close(&self, tag: &str) {
        self.publish(AgentEvent::CloseNotification { tag: tag.to_string() });
    }

    fn list_windows(&self) -> Vec<ClientWindow> {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(id, url)| ClientWindow {
                id: id.clone(),
                url: url.clone(),
            })
            .collect()
    }

    fn navigate_and_focus(&self, window_id: &str, url: &str) -> Result<(), PushError> {
        if !self.has_window(window_id) {
            return Err(PushError::Platform(format!("window {} is not connected", window_id)));
        }
        self.publish(AgentEvent::Navigate {
            window_id: window_id.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    fn open_window(&self, url: &str) -> Result<(), PushError> {
        self.publish(AgentEvent::OpenWindow { url: url.to_string() });
        Ok(())
    }

    fn subscription_changed(&self) {
        self.publish(AgentEvent::PushSubscriptionChanged);
    }
}
