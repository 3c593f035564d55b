//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::events::VoiceEvent;
use crate::interpreter::Intent;
use crate::session::SessionState;

/// Requests from a client (mic button, keyboard bridge, status bar) to the daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Request current assistant status
    GetStatus,

    /// Begin listening
    Start,

    /// Stop listening
    Stop,

    /// Mic button click
    Toggle,

    /// Push-to-talk key transition
    PushToTalk { pressed: bool },

    /// Ping to check connectivity
    Ping,

    /// Subscribe to voice event notifications
    Subscribe,
}

/// Responses from daemon to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Current assistant status
    Status(AssistantStatus),

    /// Trigger accepted and queued for the session manager
    Ack,

    /// Pong response to ping
    Pong,

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// A voice event occurred
    Event { event: VoiceEvent },
}

/// Full assistant status snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantStatus {
    /// Daemon version
    pub version: String,

    /// Current session state
    pub state: SessionState,

    /// Whether a speech engine is available
    pub voice_available: bool,

    /// Most recent transcript text
    pub last_transcript: Option<String>,

    /// Most recent dispatched intent
    pub last_intent: Option<Intent>,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl Default for AssistantStatus {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            state: SessionState::default(),
            voice_available: true,
            last_transcript: None,
            last_intent: None,
            uptime_secs: 0,
        }
    }
}
