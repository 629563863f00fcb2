use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default path of the server-push events endpoint.
pub const DEFAULT_EVENTS_PATH: &str = "/api/events";
/// Default minimum spacing between executed connect attempts.
pub const DEFAULT_CONNECT_THROTTLE_MS: u64 = 3_000;
/// Default interval between liveness checks.
pub const DEFAULT_LIVENESS_INTERVAL_MS: u64 = 3_000;
/// Default heartbeat age beyond which an open connection is considered stale.
pub const DEFAULT_STALE_AFTER_MS: u64 = 5_000;

/// Configuration for the event channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Base URL of the server, e.g. "http://127.0.0.1:8080".
    pub endpoint: String,
    /// Path of the events endpoint relative to the base URL.
    #[serde(default = "default_events_path")]
    pub events_path: String,
    /// Minimum spacing between executed connect attempts, in milliseconds.
    #[serde(default = "default_connect_throttle_ms")]
    pub connect_throttle_ms: u64,
    /// Interval between liveness checks, in milliseconds.
    #[serde(default = "default_liveness_interval_ms")]
    pub liveness_interval_ms: u64,
    /// Heartbeat age after which an open connection is stale, in milliseconds.
    #[serde(default = "default_stale_after_ms")]
    pub stale_after_ms: u64,
}

fn default_events_path() -> String {
    DEFAULT_EVENTS_PATH.to_string()
}

fn default_connect_throttle_ms() -> u64 {
    DEFAULT_CONNECT_THROTTLE_MS
}

fn default_liveness_interval_ms() -> u64 {
    DEFAULT_LIVENESS_INTERVAL_MS
}

fn default_stale_after_ms() -> u64 {
    DEFAULT_STALE_AFTER_MS
}

impl ChannelConfig {
    /// Create a configuration for the given server base URL with defaults.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            events_path: default_events_path(),
            connect_throttle_ms: DEFAULT_CONNECT_THROTTLE_MS,
            liveness_interval_ms: DEFAULT_LIVENESS_INTERVAL_MS,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
        }
    }

    /// Full URL of the events endpoint.
    pub fn events_url(&self) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), self.events_path)
    }

    pub fn connect_throttle(&self) -> Duration {
        Duration::from_millis(self.connect_throttle_ms)
    }

    pub fn liveness_interval(&self) -> Duration {
        Duration::from_millis(self.liveness_interval_ms)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.stale_after_ms)
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new("http://127.0.0.1:8080")
    }
}
