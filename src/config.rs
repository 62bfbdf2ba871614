use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
    #[serde(default)]
    pub transcription: TranscriptionConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Maximum retained entries per stream; oldest are evicted beyond this
    pub max_stream_len: usize,
    /// How long a consumer read blocks waiting for new events
    pub read_block_ms: u64,
    /// Fixed backoff before retrying a failed bus operation
    pub retry_backoff_ms: u64,
    /// Maximum events returned per read
    pub read_batch_size: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            max_stream_len: 10_000,
            read_block_ms: 1_000,
            retry_backoff_ms: 1_000,
            read_batch_size: 100,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Chunk count that triggers a transcription call
    /// (20 chunks of ~100ms each is about 2 seconds of audio)
    pub batch_chunks: usize,
    /// Hard cap on buffered chunks; oldest are dropped beyond this
    pub max_buffer_chunks: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            batch_chunks: 20,
            max_buffer_chunks: 200,
        }
    }
}

/// A configured trigger phrase and the system prompt its generation
/// runs with. The list order is the scan priority order.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerPhrase {
    pub phrase: String,
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Terminal phrase: stops the session and requests the document
    pub stop_phrase: String,
    /// Trailing transcript characters carried as trigger context
    pub context_chars: usize,
    /// Content triggers, scanned in order; the first match wins
    pub phrases: Vec<TriggerPhrase>,
    /// Prompt used when a trigger event names an unknown phrase
    pub default_prompt: String,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        let phrase = |phrase: &str, prompt: &str| TriggerPhrase {
            phrase: phrase.to_string(),
            prompt: prompt.to_string(),
        };
        Self {
            stop_phrase: "stop recording".to_string(),
            context_chars: 1000,
            phrases: vec![
                phrase(
                    "what do you think",
                    "You are a thoughtful AI companion helping someone process their thoughts. \
                     Analyze what they've said and provide meaningful insights. Be concise but \
                     insightful. Focus on connections, implications, or perspectives they might \
                     not have considered.",
                ),
                phrase(
                    "interesting",
                    "You are exploring what makes something interesting with your conversation \
                     partner. Dig deeper into why this caught their attention and explore \
                     related implications or connections. Be curious and help them discover \
                     what's compelling about this thought.",
                ),
                phrase(
                    "summarize that",
                    "You are creating a concise summary of the key points discussed. Extract \
                     the main ideas and present them in a clear, bulleted format. Focus on \
                     actionable insights and important takeaways.",
                ),
                phrase(
                    "save that thought",
                    "You are highlighting an important insight from the conversation. Reframe \
                     the key thought in a clear, memorable way that captures its essence. Make \
                     it suitable for future reference in their second brain.",
                ),
            ],
            default_prompt: "You are a helpful AI assistant.".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReaperConfig {
    /// Sweep interval in seconds
    pub sweep_interval_secs: u64,
    /// Sessions idle longer than this are retired
    pub idle_timeout_secs: u64,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 300,
            idle_timeout_secs: 3_600,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/v1".to_string(),
            api_key: String::new(),
            model: "whisper-large-v3".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: String::new(),
            model: "llama-3.1-70b-versatile".to_string(),
            temperature: 0.7,
            max_tokens: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Voice id passed through to the synthesizer
    pub voice: String,
    /// Base64 characters per streamed audio response chunk
    pub chunk_chars: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            voice: "nova".to_string(),
            chunk_chars: 4096,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("VOICE_COMPANION").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
