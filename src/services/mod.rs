//! External collaborator boundary
//!
//! Transcription, language generation, and speech synthesis are opaque
//! request/response capabilities. The pipeline only depends on the
//! traits here; the shipped implementations are thin adapters for
//! OpenAI-compatible HTTP endpoints plus a synthesizer that produces
//! no audio (synthesis is optional in the deployment this serves).

pub mod http;

use async_trait::async_trait;
use thiserror::Error;

/// A collaborator call failed. These are best-effort boundaries: the
/// caller logs and moves on (audio batches additionally retry by
/// keeping their buffer).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("transcription failed: {0}")]
    Transcription(String),
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
}

/// Speech-to-text over one batch of raw PCM bytes (16kHz mono s16le).
/// Implementations wrap the bytes in whatever container their service
/// requires; callers always hand over bare PCM.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, ServiceError>;
}

/// Text generation from a per-trigger system prompt and the transcript
/// context that fired it.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system_prompt: &str, context: &str) -> Result<String, ServiceError>;
}

/// Text-to-speech. An empty byte vector is a valid "no audio" result,
/// not an error.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, voice: &str) -> Result<Vec<u8>, ServiceError>;
}

/// Synthesizer that always reports "no audio". Keeps the response path
/// exercised end to end when no TTS backend is deployed.
pub struct NullSynthesizer;

#[async_trait]
impl Synthesizer for NullSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: &str) -> Result<Vec<u8>, ServiceError> {
        Ok(Vec::new())
    }
}
