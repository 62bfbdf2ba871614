//! In-process message bus
//!
//! Every component in the pipeline communicates through named
//! append-only event streams:
//! - `audio_stream` - raw audio chunks from connected clients
//! - `transcript_stream` - transcribed text per session
//! - `trigger_stream` - matched trigger phrases with context
//! - `tts_request_stream` / `audio_response_stream` - synthesis round trip
//! - `generate_document_stream` / `conversation_complete_stream` - document round trip

pub mod events;
pub mod stream;

pub use events::{
    AudioChunkEvent, AudioResponseEvent, CommandEvent, DocumentEvent, DocumentRequestEvent,
    InteractionEvent, SynthesisRequestEvent, TranscriptEvent, TriggerEvent,
};
pub use stream::{BusError, EventId, StreamBus, StreamEvent};
