//! Configuration schema definitions.
//!
//! ```toml
//! host_id = "10000"
//! serve = "websocket"
//! data_dir = "data"
//!
//! [logging]
//! level = "info"
//!
//! [dispatch]
//! max_concurrency = 64
//!
//! [[satori]]
//! version = 1
//! [satori.websocket]
//! ip = "127.0.0.1"
//! port = 5140
//! token = "secret"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use satori_adapter::{Account, AdapterConfig, ServeMode};
use satori_core::AdapterError;

use super::error::ConfigError;
use crate::error::RuntimeResult;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SatoriConfig {
    /// Owner account, allowed to run `/admin` and `/reload`.
    #[serde(deserialize_with = "string_or_number")]
    pub host_id: String,

    /// How events are received; shared by every endpoint.
    pub serve: ServeMode,

    /// Directory of `ban_info.json` and `admin.json`.
    pub data_dir: PathBuf,

    pub logging: LoggingConfig,

    pub dispatch: DispatchConfig,

    /// One entry per Satori gateway.
    pub satori: Vec<SatoriEndpoint>,
}

impl Default for SatoriConfig {
    fn default() -> Self {
        Self {
            host_id: String::new(),
            serve: ServeMode::WebSocket,
            data_dir: PathBuf::from("data"),
            logging: LoggingConfig::default(),
            dispatch: DispatchConfig::default(),
            satori: Vec::new(),
        }
    }
}

/// Accepts `host_id = 10000` as well as `host_id = "10000"`.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(i64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(text) => text,
        Id::Number(number) => number.to_string(),
    })
}

/// Settings of the dispatch pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Handlers allowed to run at the same time.
    pub max_concurrency: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_concurrency: satori_framework::DEFAULT_MAX_CONCURRENCY,
        }
    }
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration, consumed by [`crate::logging::init_from_config`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Target of [`LogOutput::File`].
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    pub thread_ids: bool,
    /// Show file names and line numbers.
    pub file_location: bool,
    pub span_events: SpanEventConfig,
    /// Per-module levels, e.g. `satori_adapter = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When the log file is rolled over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

// =============================================================================
// Satori endpoints
// =============================================================================

/// One `[[satori]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SatoriEndpoint {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Seconds between reconnect attempts.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay: u64,

    /// Gateway reached over WebSocket (`websocket` and `dev` modes).
    #[serde(default)]
    pub websocket: Option<WebSocketSection>,

    /// Gateway pushing events to us (`webhook` mode).
    #[serde(default)]
    pub webhook_server: Option<WebhookServerSection>,

    /// Forwarding target of `dev` mode.
    #[serde(default)]
    pub webhook_client: Option<WebhookClientSection>,
}

fn default_version() -> u32 {
    1
}

fn default_reconnect_delay() -> u64 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketSection {
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Seconds between heartbeats.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookServerSection {
    /// Address of the gateway's HTTP API.
    #[serde(default = "default_ip")]
    pub ip: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub token: Option<String>,
    /// Accounts verified through `login.get` at startup.
    #[serde(default)]
    pub accounts: Vec<Account>,
    /// Local address the webhook listener binds to.
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_root_path")]
    pub listen_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookClientSection {
    #[serde(default = "default_ip")]
    pub ip: String,
    pub port: u16,
    #[serde(default = "default_root_path")]
    pub path: String,
}

fn default_ip() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5140
}

fn default_heartbeat_interval() -> u64 {
    5
}

fn default_listen() -> String {
    "0.0.0.0:8800".to_string()
}

fn default_root_path() -> String {
    "/".to_string()
}

impl SatoriEndpoint {
    /// Flattens this entry into the adapter configuration for `serve`.
    ///
    /// `websocket` and `dev` need a `websocket` section, `dev` additionally a
    /// `webhook_client` section, `webhook` a `webhook_server` section.
    pub fn resolve(&self, serve: ServeMode, host_id: &str) -> RuntimeResult<AdapterConfig> {
        let mut config = AdapterConfig {
            host_id: host_id.to_string(),
            mode: serve,
            version: self.version,
            reconnect_delay: self.reconnect_delay,
            ..Default::default()
        };

        match serve {
            ServeMode::WebSocket | ServeMode::Dev => {
                let ws = self.websocket.as_ref().ok_or_else(|| {
                    AdapterError::Handshake("no websocket section configured".to_string())
                })?;
                config.ip.clone_from(&ws.ip);
                config.port = ws.port;
                config.path.clone_from(&ws.path);
                config.token = non_empty(ws.token.as_deref());
                config.heartbeat_interval = ws.heartbeat_interval;

                if serve == ServeMode::Dev {
                    let client = self
                        .webhook_client
                        .as_ref()
                        .ok_or(ConfigError::MissingSection("webhook_client"))?;
                    config.webhook_url = Some(format!("http://{}:{}", client.ip, client.port));
                    config.webhook_path.clone_from(&client.path);
                }
            }
            ServeMode::WebHook => {
                let server = self
                    .webhook_server
                    .as_ref()
                    .ok_or(ConfigError::MissingSection("webhook_server"))?;
                config.ip.clone_from(&server.ip);
                config.port = server.port;
                config.path.clone_from(&server.path);
                config.token = non_empty(server.token.as_deref());
                config.accounts.clone_from(&server.accounts);
            }
        }

        Ok(config)
    }
}

fn non_empty(token: Option<&str>) -> Option<String> {
    token.filter(|t| !t.is_empty()).map(str::to_string)
}
