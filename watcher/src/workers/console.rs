//! Console worker: prints toasts to the terminal

use std::future::Future;
use std::pin::Pin;

use colored::Colorize;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

use crate::notify::{Signal, ToastLevel};

/// Run the console worker until shutdown or until the signal channel closes
pub async fn run(
    mut signals: broadcast::Receiver<Signal>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!("Console worker starting...");

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => break,
            signal = signals.recv() => match signal {
                Ok(signal) => print_signal(&signal),
                Err(RecvError::Lagged(skipped)) => warn!("Console lagging, skipped {} signals", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    info!("Console worker shutting down...");
}

fn print_signal(signal: &Signal) {
    match signal {
        Signal::Toast {
            range_id,
            level,
            message,
            ..
        } => {
            let line = format!("[{}] {}", range_id, message);
            match level {
                ToastLevel::Success => println!("{} {}", "✔".green().bold(), line.green()),
                ToastLevel::Error => println!("{} {}", "✖".red().bold(), line.red()),
            }
        }
        Signal::Pulse {
            range_id,
            resource,
            status,
            ..
        } => println!(
            "{} [{}] {} {}",
            "•".cyan(),
            range_id,
            resource,
            status.to_string().bold()
        ),
        Signal::PulseExpired { resource, .. } => debug!(%resource, "Pulse expired"),
    }
}
