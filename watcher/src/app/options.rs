//! Application configuration options

use std::time::Duration;

use crate::errors::WatchError;
use crate::realtime::build_ws_url;
use crate::storage::settings::Settings;
use crate::utils::CooldownOptions;
use crate::workers::{channel, notifier, poller};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Backend API base URL
    pub backend_base_url: String,

    /// Ranges to watch at startup
    pub ranges: Vec<String>,

    /// Enable local HTTP server
    pub enable_server: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Poller worker options
    pub poller: poller::Options,

    /// Channel worker options, `None` to rely on polling alone
    pub channel: Option<channel::Options>,

    /// Notifier worker options
    pub notifier: notifier::Options,

    /// Print toasts to the terminal
    pub print_toasts: bool,
}

impl AppOptions {
    /// Build options from the settings file
    pub fn from_settings(settings: &Settings, ranges: Vec<String>) -> Result<Self, WatchError> {
        let backend = &settings.backend;

        if settings.poller.interval_ms == 0 {
            return Err(WatchError::ConfigError(
                "poller.interval_ms must be greater than zero".to_string(),
            ));
        }
        if settings.poller.request_timeout_ms == 0 {
            return Err(WatchError::ConfigError(
                "poller.request_timeout_ms must be greater than zero".to_string(),
            ));
        }

        let channel = if settings.channel.enabled {
            let url = build_ws_url(&backend.base_url, backend.ws_url.as_deref())?;
            Some(channel::Options {
                url,
                reconnect: CooldownOptions {
                    base_delay: Duration::from_millis(settings.channel.reconnect_base_ms),
                    max_delay: Duration::from_millis(settings.channel.reconnect_max_ms),
                    ..Default::default()
                },
                heartbeat_interval: Duration::from_secs(settings.channel.heartbeat_secs),
                connect_timeout: Duration::from_millis(settings.channel.connect_timeout_ms),
            })
        } else {
            None
        };

        Ok(Self {
            lifecycle: LifecycleOptions::default(),
            backend_base_url: backend.base_url.clone(),
            ranges,
            enable_server: settings.server.enabled,
            server: ServerOptions {
                host: settings.server.host.clone(),
                port: settings.server.port,
            },
            poller: poller::Options {
                interval: Duration::from_millis(settings.poller.interval_ms),
                request_timeout: Duration::from_millis(settings.poller.request_timeout_ms),
                failure_threshold: settings.poller.failure_threshold,
                ..Default::default()
            },
            channel,
            notifier: notifier::Options {
                pulse_window: Duration::from_millis(settings.notifier.pulse_window_ms),
            },
            print_toasts: true,
        })
    }
}

/// Lifecycle options for the watcher
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}
