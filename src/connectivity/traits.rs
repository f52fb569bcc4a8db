// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub reachable: bool,
    pub rtt: Option<Duration>,
}

impl ProbeOutcome {
    pub fn unreachable() -> Self {
        Self { reachable: false, rtt: None }
    }

    pub fn reachable(rtt: Duration) -> Self {
        Self { reachable: true, rtt: Some(rtt) }
    }
}

#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// Check whether the backend can currently be reached
    async fn probe(&self) -> ProbeOutcome;
}
