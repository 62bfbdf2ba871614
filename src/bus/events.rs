//! Typed views over the field maps carried on each stream.
//!
//! The bus itself only knows string field maps (binary payloads cross
//! it base64-encoded). Each record here names one stream's schema and
//! converts both ways. `from_fields` is tolerant of extra fields and
//! returns `None` when required ones are missing; consumers drop such
//! events with a warning rather than failing the loop.

use std::collections::HashMap;

use super::stream::StreamEvent;

pub const AUDIO_STREAM: &str = "audio_stream";
pub const COMMAND_STREAM: &str = "recording_command_stream";
pub const TRANSCRIPT_STREAM: &str = "transcript_stream";
pub const TRIGGER_STREAM: &str = "trigger_stream";
pub const INTERACTION_STREAM: &str = "llm_interaction_stream";
pub const SYNTHESIS_STREAM: &str = "tts_request_stream";
pub const AUDIO_RESPONSE_STREAM: &str = "audio_response_stream";
pub const DOCUMENT_REQUEST_STREAM: &str = "generate_document_stream";
pub const DOCUMENT_STREAM: &str = "conversation_complete_stream";

fn field(event: &StreamEvent, key: &str) -> Option<String> {
    event.fields.get(key).cloned()
}

fn field_or_default(event: &StreamEvent, key: &str) -> String {
    event.fields.get(key).cloned().unwrap_or_default()
}

pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// One client audio chunk on `audio_stream`. `chunk` is base64 PCM
/// exactly as the client sent it.
#[derive(Debug, Clone)]
pub struct AudioChunkEvent {
    pub session_id: String,
    pub chunk: String,
    pub sequence: u64,
    pub timestamp: String,
}

impl AudioChunkEvent {
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("chunk".to_string(), self.chunk.clone()),
            ("sequence".to_string(), self.sequence.to_string()),
            ("timestamp".to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_fields(event: &StreamEvent) -> Option<Self> {
        Some(Self {
            session_id: field(event, "session_id")?,
            chunk: field_or_default(event, "chunk"),
            sequence: field_or_default(event, "sequence").parse().unwrap_or(0),
            timestamp: field_or_default(event, "timestamp"),
        })
    }
}

/// Recording lifecycle command on `recording_command_stream`
/// (`recording_started`, `recording_stopped`, `session_ended`).
#[derive(Debug, Clone)]
pub struct CommandEvent {
    pub session_id: String,
    pub command: String,
    pub timestamp: String,
}

impl CommandEvent {
    pub fn new(session_id: &str, command: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            command: command.to_string(),
            timestamp: now_rfc3339(),
        }
    }

    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("command".to_string(), self.command.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_fields(event: &StreamEvent) -> Option<Self> {
        Some(Self {
            session_id: field(event, "session_id")?,
            command: field_or_default(event, "command"),
            timestamp: field_or_default(event, "timestamp"),
        })
    }
}

/// Transcribed text for one audio batch on `transcript_stream`.
#[derive(Debug, Clone)]
pub struct TranscriptEvent {
    pub session_id: String,
    pub text: String,
    pub timestamp: String,
}

impl TranscriptEvent {
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("text".to_string(), self.text.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_fields(event: &StreamEvent) -> Option<Self> {
        Some(Self {
            session_id: field(event, "session_id")?,
            text: field_or_default(event, "text"),
            timestamp: field_or_default(event, "timestamp"),
        })
    }
}

/// A matched trigger phrase on `trigger_stream`, carrying the trailing
/// transcript context the generator responds to.
#[derive(Debug, Clone)]
pub struct TriggerEvent {
    pub session_id: String,
    pub trigger: String,
    pub context: String,
    pub timestamp: String,
}

impl TriggerEvent {
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("trigger".to_string(), self.trigger.clone()),
            ("context".to_string(), self.context.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_fields(event: &StreamEvent) -> Option<Self> {
        Some(Self {
            session_id: field(event, "session_id")?,
            trigger: field_or_default(event, "trigger"),
            context: field_or_default(event, "context"),
            timestamp: field_or_default(event, "timestamp"),
        })
    }
}

/// A completed generation exchange on `llm_interaction_stream`; the
/// document renderer merges these into the final markdown.
#[derive(Debug, Clone)]
pub struct InteractionEvent {
    pub session_id: String,
    pub trigger: String,
    pub user_text: String,
    pub ai_response: String,
    pub timestamp: String,
}

impl InteractionEvent {
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("trigger".to_string(), self.trigger.clone()),
            ("user_text".to_string(), self.user_text.clone()),
            ("ai_response".to_string(), self.ai_response.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_fields(event: &StreamEvent) -> Option<Self> {
        Some(Self {
            session_id: field(event, "session_id")?,
            trigger: field_or_default(event, "trigger"),
            user_text: field_or_default(event, "user_text"),
            ai_response: field_or_default(event, "ai_response"),
            timestamp: field_or_default(event, "timestamp"),
        })
    }
}

/// Speech synthesis request on `tts_request_stream`.
#[derive(Debug, Clone)]
pub struct SynthesisRequestEvent {
    pub session_id: String,
    pub text: String,
    pub voice: String,
    pub timestamp: String,
}

impl SynthesisRequestEvent {
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("text".to_string(), self.text.clone()),
            ("voice".to_string(), self.voice.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_fields(event: &StreamEvent) -> Option<Self> {
        Some(Self {
            session_id: field(event, "session_id")?,
            text: field_or_default(event, "text"),
            voice: field_or_default(event, "voice"),
            timestamp: field_or_default(event, "timestamp"),
        })
    }
}

/// One synthesized audio chunk on `audio_response_stream`. `chunk` is a
/// base64 slice; `is_final` marks the last chunk of a response.
#[derive(Debug, Clone)]
pub struct AudioResponseEvent {
    pub session_id: String,
    pub chunk: String,
    pub is_final: bool,
    pub timestamp: String,
}

impl AudioResponseEvent {
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("chunk".to_string(), self.chunk.clone()),
            ("is_final".to_string(), self.is_final.to_string()),
            ("timestamp".to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_fields(event: &StreamEvent) -> Option<Self> {
        Some(Self {
            session_id: field(event, "session_id")?,
            chunk: field_or_default(event, "chunk"),
            is_final: field_or_default(event, "is_final") == "true",
            timestamp: field_or_default(event, "timestamp"),
        })
    }
}

/// Request to render the session document on `generate_document_stream`.
/// Carries the full transcript buffer at the moment the session stopped.
#[derive(Debug, Clone)]
pub struct DocumentRequestEvent {
    pub session_id: String,
    pub transcript: String,
    pub timestamp: String,
}

impl DocumentRequestEvent {
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("transcript".to_string(), self.transcript.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_fields(event: &StreamEvent) -> Option<Self> {
        Some(Self {
            session_id: field(event, "session_id")?,
            transcript: field_or_default(event, "transcript"),
            timestamp: field_or_default(event, "timestamp"),
        })
    }
}

/// Finished markdown document on `conversation_complete_stream`.
#[derive(Debug, Clone)]
pub struct DocumentEvent {
    pub session_id: String,
    pub filename: String,
    pub content: String,
    pub timestamp: String,
}

impl DocumentEvent {
    pub fn to_fields(&self) -> HashMap<String, String> {
        HashMap::from([
            ("session_id".to_string(), self.session_id.clone()),
            ("filename".to_string(), self.filename.clone()),
            ("content".to_string(), self.content.clone()),
            ("timestamp".to_string(), self.timestamp.clone()),
        ])
    }

    pub fn from_fields(event: &StreamEvent) -> Option<Self> {
        Some(Self {
            session_id: field(event, "session_id")?,
            filename: field_or_default(event, "filename"),
            content: field_or_default(event, "content"),
            timestamp: field_or_default(event, "timestamp"),
        })
    }
}
