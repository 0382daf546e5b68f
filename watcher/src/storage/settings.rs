//! Settings file management

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Watcher settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON logs on stdout
    #[serde(default)]
    pub log_json: bool,

    /// Also write rolling log files under the storage layout
    #[serde(default)]
    pub log_to_file: bool,

    /// Backend configuration
    #[serde(default)]
    pub backend: BackendSettings,

    /// Status poller configuration
    #[serde(default)]
    pub poller: PollerSettings,

    /// Push channel configuration
    #[serde(default)]
    pub channel: ChannelSettings,

    /// Transition notifier configuration
    #[serde(default)]
    pub notifier: NotifierSettings,

    /// Local HTTP server configuration
    #[serde(default)]
    pub server: ServerSettings,
}

fn default_true() -> bool {
    true
}

/// Backend API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Base URL for the REST API
    #[serde(default = "default_backend_url")]
    pub base_url: String,

    /// WebSocket URL of the push channel, derived from `base_url` when absent
    #[serde(default)]
    pub ws_url: Option<String>,
}

fn default_backend_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: default_backend_url(),
            ws_url: None,
        }
    }
}

/// Status poller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerSettings {
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Consecutive failures before the status is reported unknown
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_failure_threshold() -> u32 {
    3
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

/// Push channel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelSettings {
    /// Subscribe to pushed events in addition to polling
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    #[serde(default = "default_heartbeat_secs")]
    pub heartbeat_secs: u64,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_reconnect_base_ms() -> u64 {
    1000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

fn default_heartbeat_secs() -> u64 {
    30
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            heartbeat_secs: default_heartbeat_secs(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

/// Transition notifier settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierSettings {
    #[serde(default = "default_pulse_window_ms")]
    pub pulse_window_ms: u64,
}

fn default_pulse_window_ms() -> u64 {
    1000
}

impl Default for NotifierSettings {
    fn default() -> Self {
        Self {
            pulse_window_ms: default_pulse_window_ms(),
        }
    }
}

/// Local HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_server_port")]
    pub port: u16,
}

fn default_server_host() -> String {
    "127.0.0.1".to_string()
}

fn default_server_port() -> u16 {
    8080
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}
