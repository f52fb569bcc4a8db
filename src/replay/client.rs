// SPDX-License-Identifier: GPL-3.0-only
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::queue::models::QueuedAction;
use crate::replay::traits::{ReplayError, ReplayResponse, Replayer};

pub struct HttpReplayer {
    client: Client,
}

impl HttpReplayer {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("medsync-agent/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    fn build_headers(action: &QueuedAction) -> Result<HeaderMap, ReplayError> {
        let mut headers = HeaderMap::with_capacity(action.headers.len());
        for (name, value) in &action.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| ReplayError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| ReplayError::InvalidHeader {
                name: name.clone(),
                reason: e.to_string(),
            })?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Replayer for HttpReplayer {
    async fn replay(&self, action: &QueuedAction) -> Result<ReplayResponse, ReplayError> {
        let method = Method::from_bytes(action.method.as_bytes())
            .map_err(|_| ReplayError::InvalidMethod(action.method.clone()))?;
        let headers = Self::build_headers(action)?;

        debug!(action_id = %action.id, method = %method, url = %action.url, "Replaying request");

        let mut request = self.client.request(method, &action.url).headers(headers);
        if let Some(ref body) = action.body {
            request = request.body(body.clone());
        }

        let response = request.send().await.map_err(|e| {
            warn!(action_id = %action.id, error = %e, "Request did not reach the backend");
            ReplayError::Transport(e)
        })?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                warn!(action_id = %action.id, status, error = %e, "Failed to read response body");
                String::new()
            }
        };

        info!(action_id = %action.id, status, "Backend responded");

        Ok(ReplayResponse { status, body, content_type })
    }
}
