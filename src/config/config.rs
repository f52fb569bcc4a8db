// SPDX-License-Identifier: GPL-3.0-only
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database path for the offline queue
    pub queue_db_path: PathBuf,

    /// Hosted backend base URL; queued requests must target this origin
    pub backend_api_url: String,

    /// Origin the UI is served from, used for notification click routing
    pub app_origin: String,

    /// Local API bind address (e.g., "127.0.0.1:8787")
    pub local_api_bind: SocketAddr,

    /// URL probed for reachability; defaults to the backend URL
    pub probe_url: Option<String>,

    /// Connectivity probe interval in seconds
    pub probe_interval_secs: u64,

    /// Delay after reconnecting before the first sync attempt
    pub settle_delay_secs: u64,

    /// Timeout for forwarded and replayed requests
    pub request_timeout_secs: u64,

    /// Failed replays allowed before an action is dead-lettered
    pub max_replay_attempts: u32,

    /// Maximum age of a queued action in seconds
    pub action_ttl_secs: u64,

    /// Whether background sync registrations are honoured
    pub background_sync_enabled: bool,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,

    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Config {
    /// Load configuration from TOML file with environment variable overrides
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("MEDSYNC_CONFIG")
            .unwrap_or_else(|_| "config.toml".to_string());

        let mut config: Config = if std::path::Path::new(&config_path).exists() {
            let contents = std::fs::read_to_string(&config_path)?;
            toml::from_str(&contents)?
        } else {
            Config::default()
        };

        if let Ok(val) = std::env::var("MEDSYNC_QUEUE_DB_PATH") {
            config.queue_db_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("MEDSYNC_BACKEND_API_URL") {
            config.backend_api_url = val;
        }
        if let Ok(val) = std::env::var("MEDSYNC_APP_ORIGIN") {
            config.app_origin = val;
        }
        if let Ok(val) = std::env::var("MEDSYNC_LOCAL_API_BIND") {
            config.local_api_bind = SocketAddr::from_str(&val)?;
        }
        if let Ok(val) = std::env::var("MEDSYNC_PROBE_URL") {
            config.probe_url = Some(val);
        }
        if let Ok(val) = std::env::var("MEDSYNC_PROBE_INTERVAL_SECS") {
            config.probe_interval_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("MEDSYNC_SETTLE_DELAY_SECS") {
            config.settle_delay_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("MEDSYNC_REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("MEDSYNC_MAX_REPLAY_ATTEMPTS") {
            config.max_replay_attempts = val.parse()?;
        }
        if let Ok(val) = std::env::var("MEDSYNC_ACTION_TTL_SECS") {
            config.action_ttl_secs = val.parse()?;
        }
        if let Ok(val) = std::env::var("MEDSYNC_BACKGROUND_SYNC_ENABLED") {
            config.background_sync_enabled = val.parse()?;
        }
        if let Ok(val) = std::env::var("MEDSYNC_LOG_LEVEL") {
            config.log_level = val;
        }
        if let Ok(val) = std::env::var("MEDSYNC_LOG_JSON") {
            config.log_json = val.parse()?;
        }

        Ok(config)
    }

    /// URL the connectivity probe hits
    pub fn probe_target(&self) -> &str {
        self.probe_url.as_deref().unwrap_or(&self.backend_api_url)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_db_path: PathBuf::from("offline_queue.db"),
            backend_api_url: String::from("http://localhost:54321"),
            app_origin: String::from("http://localhost:5173"),
            local_api_bind: SocketAddr::from(([127, 0, 0, 1], 8787)),
            probe_url: None,
            probe_interval_secs: 15,
            settle_delay_secs: 3,
            request_timeout_secs: 30,
            max_replay_attempts: 10,
            action_ttl_secs: 7 * 24 * 60 * 60, // one week
            background_sync_enabled: true,
            log_level: String::from("info"),
            log_json: false,
        }
    }
}
