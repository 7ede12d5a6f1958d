//! Adapter configuration.
//!
//! [`AdapterConfig`] is the flat, already resolved view of one Satori
//! endpoint. The runtime builds it from the `[[satori]]` sections of the
//! configuration file; tests build it directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How a connection receives events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServeMode {
    /// Events arrive over the WebSocket.
    #[default]
    WebSocket,
    /// Events are POSTed to a local webhook server.
    WebHook,
    /// Events arrive over the WebSocket and are forwarded to a webhook.
    Dev,
}

/// An account served in webhook mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub platform: String,
}

/// Resolved settings of one Satori endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Owner of the bot; allowed to run `/admin` and `/reload`.
    pub host_id: String,
    pub mode: ServeMode,
    pub ip: String,
    pub port: u16,
    /// Path prefix in front of `/v{version}`.
    pub path: String,
    pub version: u32,
    pub token: Option<String>,
    /// Seconds between heartbeats.
    pub heartbeat_interval: u64,
    /// Seconds between reconnect attempts.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,
    /// Base URL of the Dev mode forwarding target.
    pub webhook_url: Option<String>,
    pub webhook_path: String,
    pub accounts: Vec<Account>,
}

fn default_reconnect_delay() -> u64 {
    5
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            host_id: String::new(),
            mode: ServeMode::WebSocket,
            ip: "127.0.0.1".to_string(),
            port: 5140,
            path: String::new(),
            version: 1,
            token: None,
            heartbeat_interval: 5,
            reconnect_delay: default_reconnect_delay(),
            webhook_url: None,
            webhook_path: String::new(),
            accounts: Vec::new(),
        }
    }
}

impl AdapterConfig {
    /// WebSocket events endpoint.
    pub fn events_url(&self) -> String {
        format!(
            "ws://{}:{}{}/v{}/events",
            self.ip, self.port, self.path, self.version
        )
    }

    /// HTTP endpoint of an API method, e.g. `message.create`.
    pub fn api_url(&self, api: &str) -> String {
        format!(
            "http://{}:{}{}/v{}/{}",
            self.ip, self.port, self.path, self.version, api
        )
    }

    /// Dev mode forwarding target, if configured.
    pub fn webhook_target(&self) -> Option<String> {
        self.webhook_url
            .as_ref()
            .map(|url| format!("{}{}", url.trim_end_matches('/'), self.webhook_path))
    }

    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval.max(1))
    }

    pub fn reconnect(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay)
    }
}
