// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coarse network quality, using the Network Information API labels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveType {
    #[serde(rename = "4g")]
    FourG,
    #[serde(rename = "3g")]
    ThreeG,
    #[serde(rename = "2g")]
    TwoG,
    #[serde(rename = "slow-2g")]
    Slow2G,
    #[default]
    #[serde(rename = "unknown")]
    Unknown,
}

impl EffectiveType {
    /// Classify a measured round-trip time
    pub fn from_rtt(rtt: Duration) -> Self {
        match rtt.as_millis() {
            ms if ms >= 2000 => EffectiveType::Slow2G,
            ms if ms >= 1400 => EffectiveType::TwoG,
            ms if ms >= 270 => EffectiveType::ThreeG,
            _ => EffectiveType::FourG,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityState {
    pub is_online: bool,

    /// Set once an offline period is observed; stays set until the
    /// consumer handles the reconnect and clears it
    pub was_offline: bool,

    pub effective_type: EffectiveType,
}

impl Default for ConnectivityState {
    fn default() -> Self {
        // Optimistic until the first probe or report says otherwise
        Self {
            is_online: true,
            was_offline: false,
            effective_type: EffectiveType::Unknown,
        }
    }
}
