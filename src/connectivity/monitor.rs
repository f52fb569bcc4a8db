// SPDX-License-Identifier: GPL-3.0-only
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::connectivity::models::{ConnectivityState, EffectiveType};
use crate::connectivity::traits::{ConnectivityProbe, ProbeOutcome};

/// Reactive connectivity state.
///
/// Fed by UI reports and by the periodic probe. Subscribers are woken only
/// when the state actually changes; `current()` never blocks.
pub struct ConnectivityMonitor {
    tx: watch::Sender<ConnectivityState>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ConnectivityState::default());
        Self { tx }
    }

    pub fn current(&self) -> ConnectivityState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityState> {
        self.tx.subscribe()
    }

    /// Online/offline signal reported by a UI window
    pub fn report(&self, online: bool) -> bool {
        self.update(online, None)
    }

    pub fn record_probe(&self, outcome: ProbeOutcome) -> bool {
        let effective_type = match outcome.rtt {
            Some(rtt) if outcome.reachable => EffectiveType::from_rtt(rtt),
            _ => EffectiveType::Unknown,
        };
        self.update(outcome.reachable, Some(effective_type))
    }

    /// Acknowledge a handled reconnect
    pub fn clear_was_offline(&self) {
        self.tx.send_if_modified(|state| {
            if state.was_offline {
                state.was_offline = false;
                true
            } else {
                false
            }
        });
    }

    fn update(&self, online: bool, effective_type: Option<EffectiveType>) -> bool {
        let mut flipped = false;
        let changed = self.tx.send_if_modified(|state| {
            let mut changed = false;
            if state.is_online != online {
                state.is_online = online;
                if !online {
                    state.was_offline = true;
                }
                flipped = true;
                changed = true;
            }
            if let Some(effective_type) = effective_type {
                if state.effective_type != effective_type {
                    state.effective_type = effective_type;
                    changed = true;
                }
            }
            changed
        });

        if flipped {
            if online {
                info!("Connectivity restored");
            } else {
                warn!("Connectivity lost");
            }
        } else if changed {
            debug!(effective_type = ?self.current().effective_type, "Connection quality changed");
        }

        changed
    }

    /// Poll the probe forever, feeding each outcome into the state.
    pub async fn run(self: Arc<Self>, probe: Arc<dyn ConnectivityProbe>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let outcome = probe.probe().await;
            self.record_probe(outcome);
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}
