//! HTTP adapters for OpenAI-compatible collaborator endpoints.

use super::{Generator, ServiceError, Transcriber};
use crate::config::{GenerationConfig, TranscriptionConfig};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

const SAMPLE_RATE: u32 = 16000;

fn build_client(api_key: &str, timeout_secs: u64) -> Result<reqwest::Client, anyhow::Error> {
    let mut headers = HeaderMap::new();
    if !api_key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", api_key))?,
        );
    }
    Ok(reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// Wrap raw 16kHz mono s16le PCM in a WAV container for upload.
fn pcm_to_wav(pcm: &[u8]) -> Result<Vec<u8>, ServiceError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buffer, spec)
            .map_err(|e| ServiceError::Transcription(format!("WAV writer: {}", e)))?;
        for sample in pcm.chunks_exact(2) {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            writer
                .write_sample(value)
                .map_err(|e| ServiceError::Transcription(format!("WAV sample: {}", e)))?;
        }
        writer
            .finalize()
            .map_err(|e| ServiceError::Transcription(format!("WAV finalize: {}", e)))?;
    }
    Ok(buffer.into_inner())
}

/// Whisper-style `/audio/transcriptions` endpoint.
pub struct HttpTranscriber {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl HttpTranscriber {
    pub fn new(cfg: &TranscriptionConfig) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: build_client(&cfg.api_key, 120)?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, pcm: &[u8]) -> Result<String, ServiceError> {
        let wav = pcm_to_wav(pcm)?;
        debug!("Uploading {} WAV bytes for transcription", wav.len());

        let part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| ServiceError::Transcription(format!("audio part: {}", e)))?;
        let form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "text")
            .text("temperature", "0");

        let url = format!("{}/audio/transcriptions", self.base_url);
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ServiceError::Transcription(format!("request to {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| ServiceError::Transcription(e.to_string()))?;

        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Transcription(format!("response body: {}", e)))?;
        Ok(text.trim().to_string())
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: Option<String>,
}

/// `/chat/completions` endpoint with a system + user message pair.
pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl HttpGenerator {
    pub fn new(cfg: &GenerationConfig) -> Result<Self, anyhow::Error> {
        Ok(Self {
            client: build_client(&cfg.api_key, 60)?,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, system_prompt: &str, context: &str) -> Result<String, ServiceError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!("Sending chat completion request to {}", url);

        let body = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: context.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::Generation(format!("request to {}: {}", url, e)))?
            .error_for_status()
            .map_err(|e| ServiceError::Generation(e.to_string()))?;

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Generation(format!("response body: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| ServiceError::Generation("completion had no content".to_string()))
    }
}
