//! Audio batching and transcription
//!
//! Consumes the audio stream from the tail, accumulates decoded chunks
//! per session in arrival order, and hands a full batch to the
//! transcriber once the chunk threshold is reached. The batch is
//! always the concatenation of every buffered chunk; on failure the
//! buffer is kept (bounded) so the next threshold crossing retries
//! with the same audio plus whatever accumulated since.

use crate::bus::events::{self, AudioChunkEvent, TranscriptEvent};
use crate::bus::{StreamBus, StreamEvent};
use crate::config::{AudioConfig, BusConfig};
use crate::services::Transcriber;
use crate::session::{SessionHandle, SessionRegistry};
use base64::Engine;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

pub struct AudioAggregator {
    bus: Arc<StreamBus>,
    registry: Arc<SessionRegistry>,
    transcriber: Arc<dyn Transcriber>,
    audio: AudioConfig,
    bus_cfg: BusConfig,
}

impl AudioAggregator {
    pub fn new(
        bus: Arc<StreamBus>,
        registry: Arc<SessionRegistry>,
        transcriber: Arc<dyn Transcriber>,
        audio: AudioConfig,
        bus_cfg: BusConfig,
    ) -> Self {
        Self {
            bus,
            registry,
            transcriber,
            audio,
            bus_cfg,
        }
    }

    /// Long-lived consumer loop. Starts at the stream tail: only
    /// chunks appended after startup are processed.
    pub async fn run(self) {
        let mut cursor = self.bus.tail_cursor(events::AUDIO_STREAM);
        let block = Duration::from_millis(self.bus_cfg.read_block_ms);
        let backoff = Duration::from_millis(self.bus_cfg.retry_backoff_ms);

        info!("Audio aggregator started (batch threshold {} chunks)", self.audio.batch_chunks);

        loop {
            let batch = match self
                .bus
                .read(events::AUDIO_STREAM, cursor, block, self.bus_cfg.read_batch_size)
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Audio stream read failed, retrying: {}", e);
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
        let Some(chunk) = AudioChunkEvent::from_fields(event) else {
            warn!("Dropping audio event {} without session_id", event.id);
            return;
        };

        let Some(handle) = self.registry.get(&chunk.session_id) else {
            debug!("Audio chunk for unknown session {}, dropping", chunk.session_id);
            return;
        };

        let bytes = match base64::engine::general_purpose::STANDARD.decode(&chunk.chunk) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Undecodable audio chunk for session {}: {}", chunk.session_id, e);
                return;
            }
        };

        let buffered = handle
            .with(|s| {
                s.audio_buffer.push(bytes);
                s.touch();
                s.audio_buffer.len()
            })
            .await;

        match buffered {
            Some(count) if count >= self.audio.batch_chunks => {
                self.transcribe_batch(&handle).await;
            }
            Some(_) => {}
            None => debug!("Session {} reaped mid-chunk, dropping", chunk.session_id),
        }
    }

    /// Submit everything buffered so far as one contiguous blob. The
    /// chunk count is snapshotted first so chunks arriving while the
    /// call is in flight survive either outcome.
    async fn transcribe_batch(&self, handle: &SessionHandle) {
        let snapshot = handle
            .with(|s| {
                let mut pcm = Vec::with_capacity(s.buffered_bytes());
                for chunk in &s.audio_buffer {
                    pcm.extend_from_slice(chunk);
                }
                (s.audio_buffer.len(), pcm)
            })
            .await;
        let Some((count, pcm)) = snapshot else {
            return;
        };

        debug!(
            "Transcribing {} chunks ({} bytes) for session {}",
            count,
            pcm.len(),
            handle.id()
        );

        match self.transcriber.transcribe(&pcm).await {
            Ok(text) => {
                let text = text.trim().to_string();
                handle
                    .with(|s| {
                        s.audio_buffer.drain(..count);
                        s.append_transcript(&text);
                    })
                    .await;

                if text.is_empty() {
                    debug!("Empty transcription for session {}", handle.id());
                    return;
                }

                info!("Transcribed {} chars for session {}", text.len(), handle.id());
                let event = TranscriptEvent {
                    session_id: handle.id().to_string(),
                    text,
                    timestamp: events::now_rfc3339(),
                };
                if let Err(e) = self.bus.append(events::TRANSCRIPT_STREAM, event.to_fields()) {
                    warn!("Failed to publish transcript for {}: {}", handle.id(), e);
                }
            }
            Err(e) => {
                error!(
                    "Transcription failed for session {} ({} chunks retained): {}",
                    handle.id(),
                    count,
                    e
                );
                // Keep the batch for the next attempt, but never let
                // the buffer grow without bound.
                let max = self.audio.max_buffer_chunks;
                let dropped = handle
                    .with(|s| {
                        if s.audio_buffer.len() > max {
                            let excess = s.audio_buffer.len() - max;
                            s.audio_buffer.drain(..excess);
                            excess
                        } else {
                            0
                        }
                    })
                    .await
                    .unwrap_or(0);
                if dropped > 0 {
                    warn!(
                        "Dropped {} oldest chunks for session {} (buffer cap {})",
                        dropped,
                        handle.id(),
                        max
                    );
                }
            }
        }
    }
}
