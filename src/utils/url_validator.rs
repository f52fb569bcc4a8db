// SPDX-License-Identifier: GPL-3.0-only
use anyhow::{Context, Result};
use url::Url;

/// Maximum allowed URL length
const MAX_URL_LENGTH: usize = 2048;

/// Parse an absolute http(s) URL with a host.
pub fn parse_http_url(url_str: &str) -> Result<Url> {
    if url_str.len() > MAX_URL_LENGTH {
        return Err(anyhow::anyhow!("URL exceeds maximum length of {} characters", MAX_URL_LENGTH));
    }

    let url = Url::parse(url_str).context("Invalid URL format")?;

    match url.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(anyhow::anyhow!(
                "Invalid URL scheme: {} (only http and https are allowed)",
                scheme
            ));
        }
    }

    if url.host_str().is_none() {
        return Err(anyhow::anyhow!("URL must have a host"));
    }

    Ok(url)
}

/// Whether two URLs share scheme, host and port
pub fn same_origin(a: &Url, b: &Url) -> bool {
    a.origin() == b.origin()
}

/// Validate that a request URL targets the configured backend.
///
/// The agent replays whatever it stores, so anything outside the backend
/// origin is refused before it reaches the queue.
pub fn validate_backend_url(url_str: &str, backend: &Url) -> Result<Url> {
    let url = parse_http_url(url_str)?;

    if !same_origin(&url, backend) {
        return Err(anyhow::anyhow!(
            "URL origin {} does not match backend origin {}",
            url.origin().ascii_serialization(),
            backend.origin().ascii_serialization()
        ));
    }

    Ok(url)
}

/// Resolve an in-app target (absolute or relative) against the app origin.
/// Targets on a foreign origin are rejected.
pub fn resolve_app_url(app_origin: &Url, target: &str) -> Result<Url> {
    let url = app_origin
        .join(target)
        .with_context(|| format!("Invalid in-app target: {}", target))?;

    if !same_origin(&url, app_origin) {
        return Err(anyhow::anyhow!("Target {} leaves the app origin", url));
    }

    Ok(url)
}
