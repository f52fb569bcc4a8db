// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::connectivity::traits::{ConnectivityProbe, ProbeOutcome};

/// Reachability check by HEAD request. Any HTTP answer, error statuses
/// included, means the network path to the backend works.
pub struct HttpProbe {
    client: Client,
    url: String,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("medsync-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn probe(&self) -> ProbeOutcome {
        let started = Instant::now();
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                let rtt = started.elapsed();
                debug!(url = %self.url, status = %response.status(), rtt_ms = rtt.as_millis() as u64, "Probe answered");
                ProbeOutcome::reachable(rtt)
            }
            Err(e) => {
                debug!(url = %self.url, error = %e, "Probe failed");
                ProbeOutcome::unreachable()
            }
        }
    }
}
