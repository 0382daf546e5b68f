//! Push channel envelopes

use serde::{Deserialize, Serialize};

use crate::models::event::RealtimeEvent;

/// Message sent by the client over the push channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { range_id: String },
    Unsubscribe { range_id: String },
    Ping,
    Pong,
}

/// Message received from the server over the push channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        #[serde(default)]
        client_id: Option<String>,
    },
    Subscribed {
        range_id: String,
    },
    Unsubscribed {
        range_id: String,
    },
    Ping,
    Pong,
    Error {
        #[serde(default)]
        message: String,
    },
    Event(RealtimeEvent),
}
