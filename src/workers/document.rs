use crate::bus::events::{
    self, DocumentEvent, DocumentRequestEvent, InteractionEvent, TranscriptEvent,
};
use crate::bus::{StreamBus, StreamEvent};
use crate::config::BusConfig;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Consumes document requests and publishes the rendered markdown on
/// the completion stream for the router to deliver.
pub struct DocumentWorker {
    bus: Arc<StreamBus>,
    bus_cfg: BusConfig,
}

impl DocumentWorker {
    pub fn new(bus: Arc<StreamBus>, bus_cfg: BusConfig) -> Self {
        Self { bus, bus_cfg }
    }

    pub async fn run(self) {
        let mut cursor = self.bus.tail_cursor(events::DOCUMENT_REQUEST_STREAM);
        let block = Duration::from_millis(self.bus_cfg.read_block_ms);
        let backoff = Duration::from_millis(self.bus_cfg.retry_backoff_ms);

        info!("Document worker started");

        loop {
            let batch = match self
                .bus
                .read(
                    events::DOCUMENT_REQUEST_STREAM,
                    cursor,
                    block,
                    self.bus_cfg.read_batch_size,
                )
                .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    warn!("Document request stream read failed, retrying: {}", e);
                    sleep(backoff).await;
                    continue;
                }
            };

            for event in batch {
                cursor = event.id;
                self.process_event(&event);
            }
        }
    }

    fn process_event(&self, event: &StreamEvent) {
        let Some(request) = DocumentRequestEvent::from_fields(event) else {
            warn!("Dropping document request {} without session_id", event.id);
            return;
        };

        info!("Rendering document for session {}", request.session_id);
        let (filename, content) =
            render_document(&self.bus, &request.session_id, &request.transcript);

        let document = DocumentEvent {
            session_id: request.session_id.clone(),
            filename,
            content,
            timestamp: events::now_rfc3339(),
        };
        if let Err(e) = self.bus.append(events::DOCUMENT_STREAM, document.to_fields()) {
            warn!(
                "Failed to publish document for {}: {}",
                request.session_id, e
            );
        }
    }
}

struct Segment {
    timestamp: DateTime<Utc>,
    text: String,
}

struct Exchange {
    timestamp: DateTime<Utc>,
    trigger: String,
    response: String,
}

enum TimelineEntry {
    Segment(Segment),
    Exchange(Exchange),
}

impl TimelineEntry {
    fn timestamp(&self) -> DateTime<Utc> {
        match self {
            TimelineEntry::Segment(s) => s.timestamp,
            TimelineEntry::Exchange(e) => e.timestamp,
        }
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| DateTime::<Utc>::UNIX_EPOCH)
}

/// Render the conversation document for one session from everything
/// retained on the transcript and interaction streams, merged
/// chronologically. `fallback_transcript` (the buffer carried on the
/// request) is used only if the transcript stream no longer holds any
/// of the session's segments (they may have been evicted).
pub fn render_document(
    bus: &StreamBus,
    session_id: &str,
    fallback_transcript: &str,
) -> (String, String) {
    let mut segments: Vec<Segment> = bus
        .read_all(events::TRANSCRIPT_STREAM)
        .unwrap_or_default()
        .iter()
        .filter_map(TranscriptEvent::from_fields)
        .filter(|t| t.session_id == session_id)
        .map(|t| Segment {
            timestamp: parse_timestamp(&t.timestamp),
            text: t.text,
        })
        .collect();
    segments.sort_by_key(|s| s.timestamp);

    let exchanges: Vec<Exchange> = bus
        .read_all(events::INTERACTION_STREAM)
        .unwrap_or_default()
        .iter()
        .filter_map(InteractionEvent::from_fields)
        .filter(|i| i.session_id == session_id)
        .map(|i| Exchange {
            timestamp: parse_timestamp(&i.timestamp),
            trigger: i.trigger,
            response: i.ai_response,
        })
        .collect();

    if segments.is_empty() && fallback_transcript.trim().is_empty() {
        let filename = format!("conversation-{}.md", Utc::now().format("%Y-%m-%d-%H%M%S"));
        return (
            filename,
            "# Empty Conversation\n\nNo transcripts found.".to_string(),
        );
    }

    let start_time = segments
        .first()
        .map(|s| s.timestamp)
        .unwrap_or_else(Utc::now);
    let filename = format!(
        "conversation-{}.md",
        start_time.format("%Y-%m-%d-%H%M%S")
    );

    if segments.is_empty() {
        // Segments evicted from the stream; fall back to the carried
        // buffer as a single untimed block.
        let content = format!(
            "# Conversation - {}\n\n## Transcript\n\n{}\n",
            start_time.format("%Y-%m-%d %H:%M:%S"),
            fallback_transcript.trim()
        );
        return (filename, content);
    }

    let end_time = segments.last().map(|s| s.timestamp).unwrap_or(start_time);
    let duration_secs = (end_time - start_time).num_seconds().max(0);

    let mut timeline: Vec<TimelineEntry> = segments
        .into_iter()
        .map(TimelineEntry::Segment)
        .chain(exchanges.into_iter().map(TimelineEntry::Exchange))
        .collect();
    timeline.sort_by_key(|e| e.timestamp());

    let mut doc = format!(
        "# Conversation - {}\n\n**Duration:** {}:{:02}\n\n## Transcript\n\n",
        start_time.format("%Y-%m-%d %H:%M:%S"),
        duration_secs / 60,
        duration_secs % 60
    );

    for entry in timeline {
        match entry {
            TimelineEntry::Segment(segment) => {
                let offset = (segment.timestamp - start_time).num_seconds().max(0);
                doc.push_str(&format!(
                    "[{:02}:{:02}] {}\n\n",
                    offset / 60,
                    offset % 60,
                    segment.text
                ));
            }
            TimelineEntry::Exchange(exchange) => match exchange.trigger.as_str() {
                "save that thought" => {
                    doc.push_str(&format!(
                        "### \u{1f4a1} Saved Thought\n\"{}\"\n\n",
                        exchange.response
                    ));
                }
                "summarize that" => {
                    doc.push_str(&format!("### Summary\n{}\n\n", exchange.response));
                }
                _ => {
                    doc.push_str(&format!("### AI Response\n{}\n\n", exchange.response));
                }
            },
        }
    }

    (filename, doc)
}
