//! Client-facing WebSocket message types.
//!
//! All messages are JSON objects tagged with a `type` field, matching
//! what the mobile client sends and expects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Messages accepted from the client.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    /// One chunk of captured audio, base64-encoded PCM.
    AudioChunk {
        audio: String,
        #[serde(default)]
        sequence: u64,
        #[serde(default)]
        timestamp: Option<String>,
    },
    /// Recording started/stopped toggle.
    RecordingStatus { status: RecordingStatus },
    /// Keepalive.
    Ping,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingStatus {
    Started,
    Stopped,
}

impl fmt::Display for RecordingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordingStatus::Started => write!(f, "started"),
            RecordingStatus::Stopped => write!(f, "stopped"),
        }
    }
}

/// Messages sent to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    SessionStarted {
        session_id: String,
        timestamp: String,
    },
    StatusConfirmed {
        status: RecordingStatus,
        timestamp: String,
    },
    Pong {
        timestamp: String,
    },
    /// One chunk of synthesized response audio, base64-encoded.
    AudioResponse {
        audio: String,
        is_final: bool,
        timestamp: String,
    },
    /// The rendered conversation document for a finished session.
    ConversationDocument {
        filename: String,
        content: String,
        timestamp: String,
    },
}
