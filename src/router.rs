//! Response routing
//!
//! Consumes the synthesized-audio and completed-document streams and
//! forwards each event to the live connection owned by the matching
//! session. Delivery is best-effort and at-most-once: an unknown
//! session or an absent connection drops the event silently. A
//! delivered (or dropped) document additionally finalizes the session,
//! the terminal step of the stop path.

use crate::bus::events::{self, AudioResponseEvent, DocumentEvent};
use crate::bus::StreamBus;
use crate::config::BusConfig;
use crate::gateway::protocol::OutboundMessage;
use crate::session::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub struct ResponseRouter {
    bus: Arc<StreamBus>,
    registry: Arc<SessionRegistry>,
    bus_cfg: BusConfig,
}

impl ResponseRouter {
    pub fn new(bus: Arc<StreamBus>, registry: Arc<SessionRegistry>, bus_cfg: BusConfig) -> Self {
        Self {
            bus,
            registry,
            bus_cfg,
        }
    }

    pub async fn run(self) {
        info!("Response router started");
        tokio::join!(self.route_audio_responses(), self.route_documents());
    }

    async fn route_audio_responses(&self) {
        let mut cursor = self.bus.tail_cursor(events::AUDIO_RESPONSE_STREAM);
        let block = Duration::from_millis(self.bus_cfg.read_block_ms);
        let backoff = Duration::from_millis(self.bus_cfg.retry_backoff_ms);

        loop {
            let batch = match self
                .bus
                .read(
                    events::AUDIO_RESPONSE_STREAM,
                    cursor,
                    block,
                    self.bus_cfg.read_batch_size,
                )
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Audio response stream read failed, retrying: {}", e);
                    sleep(backoff).await;
                    continue;
                }
            };

            for event in batch {
                cursor = event.id;
                let Some(response) = AudioResponseEvent::from_fields(&event) else {
                    warn!("Dropping audio response {} without session_id", event.id);
                    continue;
                };
                self.forward(
                    &response.session_id,
                    OutboundMessage::AudioResponse {
                        audio: response.chunk,
                        is_final: response.is_final,
                        timestamp: events::now_rfc3339(),
                    },
                )
                .await;
            }
        }
    }

    async fn route_documents(&self) {
        let mut cursor = self.bus.tail_cursor(events::DOCUMENT_STREAM);
        let block = Duration::from_millis(self.bus_cfg.read_block_ms);
        let backoff = Duration::from_millis(self.bus_cfg.retry_backoff_ms);

        loop {
            let batch = match self
                .bus
                .read(
                    events::DOCUMENT_STREAM,
                    cursor,
                    block,
                    self.bus_cfg.read_batch_size,
                )
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Document stream read failed, retrying: {}", e);
                    sleep(backoff).await;
                    continue;
                }
            };

            for event in batch {
                cursor = event.id;
                let Some(document) = DocumentEvent::from_fields(&event) else {
                    warn!("Dropping document event {} without session_id", event.id);
                    continue;
                };
                let session_id = document.session_id.clone();
                self.forward(
                    &session_id,
                    OutboundMessage::ConversationDocument {
                        filename: document.filename,
                        content: document.content,
                        timestamp: events::now_rfc3339(),
                    },
                )
                .await;

                // The document is the session's terminal artifact;
                // finalize whether or not the client was still there.
                if self.registry.remove(&session_id) {
                    info!("Session {} finalized", session_id);
                }
            }
        }
    }

    /// Deliver to the session's connection if one is still attached.
    /// Returns whether the message was handed to the writer.
    async fn forward(&self, session_id: &str, message: OutboundMessage) -> bool {
        let Some(handle) = self.registry.get(session_id) else {
            debug!("Response for unknown session {}, dropping", session_id);
            return false;
        };

        let sender = handle.with(|s| s.outbound.clone()).await.flatten();
        match sender {
            Some(sender) => {
                if sender.send(message).is_err() {
                    debug!("Connection for session {} closed, dropping response", session_id);
                    return false;
                }
                true
            }
            None => {
                debug!("No live connection for session {}, dropping response", session_id);
                false
            }
        }
    }
}
