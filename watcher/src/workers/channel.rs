//! Push channel worker: keeps one range subscribed over WebSocket

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use range_api::{ClientMessage, RealtimeEvent, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::errors::WatchError;
use crate::models::ConnectionState;
use crate::realtime::client::WsClient;
use crate::utils::CooldownOptions;

/// Channel worker options
#[derive(Debug, Clone)]
pub struct Options {
    /// Push endpoint
    pub url: Url,

    /// Reconnect backoff
    pub reconnect: CooldownOptions,

    /// Client ping interval
    pub heartbeat_interval: Duration,

    /// Handshake timeout
    pub connect_timeout: Duration,
}

impl Options {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            reconnect: CooldownOptions::default(),
            heartbeat_interval: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// What the channel reports to its owner
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelOutput {
    State(ConnectionState),
    Event(RealtimeEvent),
    /// The server acknowledged the subscription. `resumed` is set on every
    /// acknowledgement after the first one.
    Subscribed { resumed: bool },
}

enum SessionEnd {
    Shutdown,
    Closed,
    Failed,
}

#[derive(Default)]
struct Link {
    attempt: u32,
    subscribed_before: bool,
}

/// Run the channel worker until `shutdown_signal` resolves or the output
/// receiver is dropped
pub async fn run(
    options: &Options,
    range_id: &str,
    output: mpsc::UnboundedSender<ChannelOutput>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) {
    info!(range_id, url = %options.url, "Channel worker starting...");

    let emit = |out: ChannelOutput| output.send(out).is_ok();
    let mut link = Link::default();

    loop {
        if !emit(ChannelOutput::State(ConnectionState::Connecting)) {
            return;
        }

        let connection = tokio::select! {
            _ = &mut shutdown_signal => {
                info!(range_id, "Channel worker shutting down...");
                emit(ChannelOutput::State(ConnectionState::Disconnected));
                return;
            }
            result = WsClient::connect(&options.url, options.connect_timeout) => result,
        };

        let end = match connection {
            Ok(mut client) => {
                info!(range_id, "Connected to event channel");
                emit(ChannelOutput::State(ConnectionState::Connected));
                let end = session(
                    &mut client,
                    options,
                    range_id,
                    &emit,
                    &mut link,
                    &mut shutdown_signal,
                )
                .await;
                if let SessionEnd::Shutdown = end {
                    let unsubscribe = ClientMessage::Unsubscribe {
                        range_id: range_id.to_string(),
                    };
                    if let Err(e) = client.send(&unsubscribe).await {
                        debug!(range_id, "Failed to send unsubscribe: {}", e);
                    }
                    client.close().await;
                }
                end
            }
            Err(e) => {
                error!(range_id, "Failed to connect to event channel: {}", e);
                SessionEnd::Failed
            }
        };

        match end {
            SessionEnd::Shutdown => {
                info!(range_id, "Channel worker shutting down...");
                emit(ChannelOutput::State(ConnectionState::Disconnected));
                return;
            }
            SessionEnd::Closed => {
                warn!(range_id, "Event channel closed");
                if !emit(ChannelOutput::State(ConnectionState::Disconnected)) {
                    return;
                }
            }
            SessionEnd::Failed => {
                if !emit(ChannelOutput::State(ConnectionState::Error)) {
                    return;
                }
            }
        }

        let delay = options.reconnect.delay(link.attempt);
        link.attempt = link.attempt.saturating_add(1);
        info!(range_id, "Reconnecting in {:?}...", delay);

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!(range_id, "Channel worker shutting down...");
                emit(ChannelOutput::State(ConnectionState::Disconnected));
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

async fn session<E>(
    client: &mut WsClient,
    options: &Options,
    range_id: &str,
    emit: &E,
    link: &mut Link,
    shutdown_signal: &mut Pin<Box<dyn Future<Output = ()> + Send>>,
) -> SessionEnd
where
    E: Fn(ChannelOutput) -> bool,
{
    let subscribe = ClientMessage::Subscribe {
        range_id: range_id.to_string(),
    };
    if let Err(e) = client.send(&subscribe).await {
        warn!(range_id, "Failed to subscribe: {}", e);
        return SessionEnd::Failed;
    }

    let start = tokio::time::Instant::now() + options.heartbeat_interval;
    let mut heartbeat = tokio::time::interval_at(start, options.heartbeat_interval);

    loop {
        tokio::select! {
            _ = &mut *shutdown_signal => return SessionEnd::Shutdown,
            _ = heartbeat.tick() => {
                if let Err(e) = client.send(&ClientMessage::Ping).await {
                    warn!(range_id, "Failed to send heartbeat: {}", e);
                    return SessionEnd::Failed;
                }
            }
            msg = client.next_message() => {
                let delivered = match msg {
                    Some(Ok(ServerMessage::Subscribed { range_id: acked })) if acked == range_id => {
                        let resumed = link.subscribed_before;
                        link.subscribed_before = true;
                        link.attempt = 0;
                        info!(range_id, resumed, "Subscribed to range events");
                        emit(ChannelOutput::Subscribed { resumed })
                    }
                    Some(Ok(ServerMessage::Event(event))) => {
                        if event.range_id == range_id {
                            emit(ChannelOutput::Event(event))
                        } else {
                            debug!(range_id, other = %event.range_id, "Skipping event for another range");
                            true
                        }
                    }
                    Some(Ok(ServerMessage::Ping)) => {
                        if let Err(e) = client.send(&ClientMessage::Pong).await {
                            warn!(range_id, "Failed to answer ping: {}", e);
                            return SessionEnd::Failed;
                        }
                        true
                    }
                    Some(Ok(ServerMessage::Error { message })) => {
                        warn!(range_id, "Event channel error: {}", message);
                        true
                    }
                    Some(Ok(other)) => {
                        debug!(range_id, "Channel message: {:?}", other);
                        true
                    }
                    Some(Err(WatchError::ProtocolError(e))) => {
                        warn!(range_id, "Skipping malformed frame: {}", e);
                        true
                    }
                    Some(Err(e)) => {
                        error!(range_id, "Event channel error: {}", e);
                        return SessionEnd::Failed;
                    }
                    None => return SessionEnd::Closed,
                };
                if !delivered {
                    return SessionEnd::Shutdown;
                }
            }
        }
    }
}
