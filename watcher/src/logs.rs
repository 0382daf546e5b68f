//! Logging setup

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::errors::WatchError;

/// Default verbosity, overridden by `RUST_LOG`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    #[serde(alias = "warning")]
    Warn,
    Error,
}

impl LogLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_lowercase()))
            .map_err(|_| WatchError::ConfigError(format!("invalid log level: {}", s)))
    }
}

#[derive(Debug, Clone)]
pub struct LogOptions {
    pub log_level: LogLevel,

    /// Write logs to stdout
    pub stdout: bool,

    /// Directory for daily-rolling log files, disabled when `None`
    pub log_dir: Option<PathBuf>,

    /// One JSON object per line on stdout
    pub json_format: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            stdout: true,
            log_dir: None,
            json_format: false,
        }
    }
}

/// Install the global subscriber.
///
/// Hold the returned guard until exit, the file writer flushes on drop.
pub fn init_logging(options: LogOptions) -> Result<Option<WorkerGuard>, WatchError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(options.log_level.as_str()));

    let stdout_layer = match (options.stdout, options.json_format) {
        (false, _) => None,
        (true, true) => Some(tracing_subscriber::fmt::layer().json().boxed()),
        (true, false) => Some(tracing_subscriber::fmt::layer().boxed()),
    };

    let mut guard = None;
    let file_layer = options.log_dir.as_ref().map(|dir| {
        let (writer, file_guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "rangewatch.log"));
        guard = Some(file_guard);
        tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .boxed()
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| WatchError::ConfigError(format!("logging already initialized: {}", e)))?;

    Ok(guard)
}
