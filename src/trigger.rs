//! Trigger phrase detection
//!
//! Consumes the transcript stream and scans each increment for the
//! configured phrases. The phrase list is ordered and the first match
//! wins; at most one trigger fires per increment. The stop phrase is
//! terminal: it is checked before any content phrase, stops the
//! session, and requests the conversation document instead of a
//! generated reply.

use crate::bus::events::{self, CommandEvent, DocumentRequestEvent, TriggerEvent};
use crate::bus::{StreamBus, StreamEvent};
use crate::config::{BusConfig, TriggerConfig};
use crate::session::{SessionRegistry, SessionState};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub struct TriggerDetector {
    bus: Arc<StreamBus>,
    registry: Arc<SessionRegistry>,
    cfg: TriggerConfig,
    bus_cfg: BusConfig,
    /// Case-folded copies of the configured phrases, in priority order.
    folded_phrases: Vec<String>,
}

impl TriggerDetector {
    pub fn new(
        bus: Arc<StreamBus>,
        registry: Arc<SessionRegistry>,
        cfg: TriggerConfig,
        bus_cfg: BusConfig,
    ) -> Self {
        let folded_phrases = cfg.phrases.iter().map(|p| p.phrase.to_lowercase()).collect();
        Self {
            bus,
            registry,
            cfg,
            bus_cfg,
            folded_phrases,
        }
    }

    pub async fn run(self) {
        let mut cursor = self.bus.tail_cursor(events::TRANSCRIPT_STREAM);
        let block = Duration::from_millis(self.bus_cfg.read_block_ms);
        let backoff = Duration::from_millis(self.bus_cfg.retry_backoff_ms);

        info!(
            "Trigger detector started ({} phrases + stop phrase \"{}\")",
            self.cfg.phrases.len(),
            self.cfg.stop_phrase
        );

        loop {
            let batch = match self
                .bus
                .read(
                    events::TRANSCRIPT_STREAM,
                    cursor,
                    block,
                    self.bus_cfg.read_batch_size,
                )
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Transcript stream read failed, retrying: {}", e);
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
        let Some(transcript) = events::TranscriptEvent::from_fields(event) else {
            warn!("Dropping transcript event {} without session_id", event.id);
            return;
        };

        let folded = transcript.text.to_lowercase();

        // The stop phrase wins any tie within the same increment.
        if folded.contains(&self.cfg.stop_phrase.to_lowercase()) {
            self.handle_stop(&transcript.session_id).await;
            return;
        }

        for (folded_phrase, configured) in self.folded_phrases.iter().zip(&self.cfg.phrases) {
            if folded.contains(folded_phrase.as_str()) {
                self.publish_trigger(&transcript.session_id, &configured.phrase)
                    .await;
                return; // one trigger per scan pass
            }
        }
    }

    /// Terminal control signal: stop the session and request the
    /// document with the full transcript buffer, bypassing generation.
    async fn handle_stop(&self, session_id: &str) {
        let Some(handle) = self.registry.get(session_id) else {
            warn!("Stop phrase for unknown session {}, dropping", session_id);
            return;
        };

        let transcript = handle
            .with(|s| {
                s.state = SessionState::Stopped;
                s.touch();
                s.transcript.clone()
            })
            .await;
        let Some(transcript) = transcript else {
            return;
        };

        info!("Stop phrase detected, stopping session {}", session_id);

        let command = CommandEvent::new(session_id, "recording_stopped");
        if let Err(e) = self.bus.append(events::COMMAND_STREAM, command.to_fields()) {
            warn!("Failed to append stop command for {}: {}", session_id, e);
        }

        let request = DocumentRequestEvent {
            session_id: session_id.to_string(),
            transcript,
            timestamp: events::now_rfc3339(),
        };
        if let Err(e) = self
            .bus
            .append(events::DOCUMENT_REQUEST_STREAM, request.to_fields())
        {
            warn!("Failed to request document for {}: {}", session_id, e);
        }
    }

    async fn publish_trigger(&self, session_id: &str, phrase: &str) {
        let Some(handle) = self.registry.get(session_id) else {
            debug!("Trigger for unknown session {}, dropping", session_id);
            return;
        };

        let context = handle
            .with(|s| {
                s.touch();
                tail_chars(&s.transcript, self.cfg.context_chars).to_string()
            })
            .await;
        let Some(context) = context else {
            return;
        };

        info!("Trigger \"{}\" fired for session {}", phrase, session_id);

        let event = TriggerEvent {
            session_id: session_id.to_string(),
            trigger: phrase.to_string(),
            context,
            timestamp: events::now_rfc3339(),
        };
        if let Err(e) = self.bus.append(events::TRIGGER_STREAM, event.to_fields()) {
            warn!("Failed to publish trigger for {}: {}", session_id, e);
        }
    }
}

/// Last `n` characters of `s`, on a char boundary.
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}
