//! Range Watcher - Entry Point
//!
//! Watches range deployments and keeps a live, reconciled view of every
//! router, network and VM.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use anyhow::Context;
use rangewatch::app::options::AppOptions;
use rangewatch::app::run::run;
use rangewatch::filesys::file::File;
use rangewatch::logs::{init_logging, LogOptions};
use rangewatch::reconcile::LoggingListener;
use rangewatch::storage::layout::StorageLayout;
use rangewatch::storage::settings::Settings;
use rangewatch::utils::version_info;

use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(_) => println!("{}", version.version),
        }
        return;
    }

    let ranges: Vec<String> = cli_args
        .get("range")
        .map(|list| {
            list.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    // Retrieve the settings file
    let layout = StorageLayout::default();
    let settings_file = match cli_args.get("settings") {
        Some(path) => File::new(path),
        None => layout.settings_file(),
    };
    let settings = match load_settings(&settings_file).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {:#}", e);
            return;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level,
        json_format: settings.log_json,
        log_dir: settings.log_to_file.then(|| layout.logs_dir()),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    if ranges.is_empty() {
        warn!("No --range given, waiting for ranges to be watched over HTTP");
    }

    let options = match AppOptions::from_settings(&settings, ranges) {
        Ok(options) => options,
        Err(e) => {
            error!("Invalid settings: {}", e);
            return;
        }
    };

    info!("Running range watcher {} with options: {:?}", version.version, options);
    let result = run(options, Arc::new(LoggingListener), await_shutdown_signal()).await;
    if let Err(e) = result {
        error!("Failed to run the range watcher: {e}");
    }
}

/// Read the settings file, falling back to defaults when it does not exist
async fn load_settings(file: &File) -> anyhow::Result<Settings> {
    if !file.exists().await {
        return Ok(Settings::default());
    }
    file.read_json::<Settings>()
        .await
        .with_context(|| format!("reading {}", file.path().display()))
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
                _ => {
                    error!("Failed to install signal handlers, falling back to Ctrl+C");
                    let _ = tokio::signal::ctrl_c().await;
                    return;
                }
            };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
        }
        info!("Ctrl+C received, shutting down...");
    }
}
