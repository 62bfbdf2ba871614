use crate::bus::events::{self, AudioResponseEvent, SynthesisRequestEvent};
use crate::bus::{StreamBus, StreamEvent};
use crate::config::{BusConfig, SynthesisConfig};
use crate::services::Synthesizer;
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

/// Consumes synthesis requests and streams the resulting audio back as
/// fixed-size base64 chunks, the last one flagged `is_final`. A
/// synthesizer returning no audio still produces a single empty final
/// chunk so the client observes completion.
pub struct SynthesisWorker {
    bus: Arc<StreamBus>,
    synthesizer: Arc<dyn Synthesizer>,
    cfg: SynthesisConfig,
    bus_cfg: BusConfig,
}

impl SynthesisWorker {
    pub fn new(
        bus: Arc<StreamBus>,
        synthesizer: Arc<dyn Synthesizer>,
        cfg: SynthesisConfig,
        bus_cfg: BusConfig,
    ) -> Self {
        Self {
            bus,
            synthesizer,
            cfg,
            bus_cfg,
        }
    }

    pub async fn run(self) {
        let mut cursor = self.bus.tail_cursor(events::SYNTHESIS_STREAM);
        let block = Duration::from_millis(self.bus_cfg.read_block_ms);
        let backoff = Duration::from_millis(self.bus_cfg.retry_backoff_ms);

        info!("Synthesis worker started");

        loop {
            let batch = match self
                .bus
                .read(
                    events::SYNTHESIS_STREAM,
                    cursor,
                    block,
                    self.bus_cfg.read_batch_size,
                )
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Synthesis stream read failed, retrying: {}", e);
                    sleep(backoff).await;
                    continue;
                }
            };

            for event in batch {
                cursor = event.id;
                self.process_event(&event).await;
            }
        }
    }

    async fn process_event(&self, event: &StreamEvent) {
        let Some(request) = SynthesisRequestEvent::from_fields(event) else {
            warn!("Dropping synthesis request {} without session_id", event.id);
            return;
        };

        let audio = match self
            .synthesizer
            .synthesize(&request.text, &request.voice)
            .await
        {
            Ok(audio) => audio,
            Err(e) => {
                error!(
                    "Synthesis failed for session {}, abandoning: {}",
                    request.session_id, e
                );
                return;
            }
        };

        self.stream_response(&request.session_id, &audio);
    }

    fn stream_response(&self, session_id: &str, audio: &[u8]) {
        if audio.is_empty() {
            // No audio is a valid result; emit one empty final chunk
            // so the client sees the response complete.
            self.publish_chunk(session_id, String::new(), true);
            return;
        }

        let encoded = base64::engine::general_purpose::STANDARD.encode(audio);
        let chunk_chars = self.cfg.chunk_chars.max(1);
        let total = encoded.len().div_ceil(chunk_chars);

        // Base64 output is ASCII, so byte offsets are char boundaries.
        for (index, start) in (0..encoded.len()).step_by(chunk_chars).enumerate() {
            let end = (start + chunk_chars).min(encoded.len());
            self.publish_chunk(
                session_id,
                encoded[start..end].to_string(),
                index + 1 == total,
            );
        }

        info!("Streamed {} audio chunks for session {}", total, session_id);
    }

    fn publish_chunk(&self, session_id: &str, chunk: String, is_final: bool) {
        let event = AudioResponseEvent {
            session_id: session_id.to_string(),
            chunk,
            is_final,
            timestamp: events::now_rfc3339(),
        };
        if let Err(e) = self
            .bus
            .append(events::AUDIO_RESPONSE_STREAM, event.to_fields())
        {
            warn!("Failed to publish audio chunk for {}: {}", session_id, e);
        }
    }
}
