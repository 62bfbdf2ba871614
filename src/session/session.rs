use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::gateway::protocol::OutboundMessage;

/// Lifecycle of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Client connected, not yet recording
    Connected,
    /// Actively streaming audio
    Recording,
    /// Stopped by the client, a trigger phrase, or disconnect
    Stopped,
    /// Retired by the reaper; the registry entry is gone
    Reaped,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionState::Connected => "connected",
            SessionState::Recording => "recording",
            SessionState::Stopped => "stopped",
            SessionState::Reaped => "reaped",
        };
        write!(f, "{}", label)
    }
}

/// One continuous capture interaction, from connection to stop or
/// idle-reap. Mutated only through a `SessionHandle` obtained from the
/// registry.
pub struct Session {
    pub id: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    /// Decoded audio chunks in arrival order. Arrival order is
    /// authoritative; sequence numbers are carried on the bus but not
    /// used for reordering or gap detection.
    pub audio_buffer: Vec<Vec<u8>>,
    /// Append-only accumulated transcript text.
    pub transcript: String,
    /// Sender feeding the connection's writer task. `None` once the
    /// client is gone; absence is a normal branch, never an error.
    pub outbound: Option<mpsc::UnboundedSender<OutboundMessage>>,
}

impl Session {
    pub fn new(id: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            state: SessionState::Connected,
            started_at: now,
            last_activity: now,
            audio_buffer: Vec::new(),
            transcript: String::new(),
            outbound: None,
        }
    }

    /// Record activity for idle-reaping purposes.
    pub fn touch(&mut self) {
        self.last_activity = Utc::now();
    }

    /// Append a transcribed segment, space-separated from what came
    /// before. The transcript only ever grows.
    pub fn append_transcript(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if !self.transcript.is_empty() {
            self.transcript.push(' ');
        }
        self.transcript.push_str(text);
    }

    /// Total bytes currently buffered for transcription.
    pub fn buffered_bytes(&self) -> usize {
        self.audio_buffer.iter().map(|c| c.len()).sum()
    }
}
