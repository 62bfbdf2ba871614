// Integration tests for trigger phrase detection
//
// These run the detector loop against the real bus and verify the
// ordered first-match-wins scan, the one-trigger-per-increment rule,
// and the terminal stop phrase behavior.

use std::sync::Arc;
use std::time::Duration;
use voice_companion::bus::events::{
    self, DocumentRequestEvent, TranscriptEvent, TriggerEvent,
};
use voice_companion::config::{BusConfig, TriggerConfig};
use voice_companion::{SessionRegistry, SessionState, StreamBus, TriggerDetector};

fn start_detector(
    bus: &Arc<StreamBus>,
    registry: &Arc<SessionRegistry>,
    cfg: TriggerConfig,
) -> tokio::task::JoinHandle<()> {
    let detector = TriggerDetector::new(
        Arc::clone(bus),
        Arc::clone(registry),
        cfg,
        BusConfig::default(),
    );
    tokio::spawn(detector.run())
}

async fn publish_transcript(
    bus: &StreamBus,
    registry: &SessionRegistry,
    session_id: &str,
    text: &str,
) {
    // Mirror the aggregator: the transcript buffer already contains
    // the increment by the time the event is published.
    if let Some(handle) = registry.get(session_id) {
        handle.with(|s| s.append_transcript(text)).await;
    }
    let event = TranscriptEvent {
        session_id: session_id.to_string(),
        text: text.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };
    bus.append(events::TRANSCRIPT_STREAM, event.to_fields())
        .unwrap();
}

async fn wait_for_stream(bus: &StreamBus, stream: &str, expected: usize) -> Vec<TriggerEvent> {
    for _ in 0..250 {
        let all = bus.read_all(stream).unwrap();
        if all.len() >= expected {
            return all
                .iter()
                .filter_map(TriggerEvent::from_fields)
                .collect();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("stream {} never reached {} events", stream, expected);
}

#[tokio::test]
async fn matching_phrase_publishes_trigger_with_context() {
    let bus = Arc::new(StreamBus::new(10_000));
    let registry = Arc::new(SessionRegistry::new());
    registry.get_or_create("s1");

    let task = start_detector(&bus, &registry, TriggerConfig::default());
    tokio::time::sleep(Duration::from_millis(100)).await;

    publish_transcript(&bus, &registry, "s1", "well that's Interesting I suppose").await;

    let triggers = wait_for_stream(&bus, events::TRIGGER_STREAM, 1).await;
    assert_eq!(triggers.len(), 1);
    assert_eq!(triggers[0].session_id, "s1");
    assert_eq!(triggers[0].trigger, "interesting");
    assert!(triggers[0].context.contains("Interesting I suppose"));

    task.abort();
}

#[tokio::test]
async fn first_configured_phrase_wins_regardless_of_position() {
    let bus = Arc::new(StreamBus::new(10_000));
    let registry = Arc::new(SessionRegistry::new());
    registry.get_or_create("s1");

    let task = start_detector(&bus, &registry, TriggerConfig::default());
    tokio::time::sleep(Duration::from_millis(100)).await;

    // "interesting" appears first in the text, but "what do you think"
    // is earlier in the configured order and must win.
    publish_transcript(
        &bus,
        &registry,
        "s1",
        "this is interesting but what do you think about it",
    )
    .await;

    let triggers = wait_for_stream(&bus, events::TRIGGER_STREAM, 1).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    let all = bus.read_all(events::TRIGGER_STREAM).unwrap();
    assert_eq!(all.len(), 1, "exactly one trigger per increment");
    assert_eq!(triggers[0].trigger, "what do you think");

    task.abort();
}

#[tokio::test]
async fn context_is_bounded_to_configured_chars() {
    let bus = Arc::new(StreamBus::new(10_000));
    let registry = Arc::new(SessionRegistry::new());
    registry.get_or_create("s1");

    let task = start_detector(&bus, &registry, TriggerConfig::default());
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Grow the transcript well past the context bound first.
    let filler = "lorem ipsum ".repeat(200);
    publish_transcript(&bus, &registry, "s1", &filler).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    publish_transcript(&bus, &registry, "s1", "now that is interesting").await;

    let triggers = wait_for_stream(&bus, events::TRIGGER_STREAM, 1).await;
    assert!(triggers[0].context.chars().count() <= 1000);
    assert!(triggers[0].context.ends_with("now that is interesting"));

    task.abort();
}

#[tokio::test]
async fn stop_phrase_stops_session_and_requests_document() {
    let bus = Arc::new(StreamBus::new(10_000));
    let registry = Arc::new(SessionRegistry::new());
    let handle = registry.get_or_create("s1");
    handle
        .with(|s| s.state = SessionState::Recording)
        .await;

    let task = start_detector(&bus, &registry, TriggerConfig::default());
    tokio::time::sleep(Duration::from_millis(100)).await;

    publish_transcript(&bus, &registry, "s1", "some earlier thoughts").await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    publish_transcript(&bus, &registry, "s1", "okay please stop recording now").await;

    for _ in 0..250 {
        if !bus
            .read_all(events::DOCUMENT_REQUEST_STREAM)
            .unwrap()
            .is_empty()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let state = handle.with(|s| s.state).await.unwrap();
    assert_eq!(state, SessionState::Stopped);

    let requests: Vec<DocumentRequestEvent> = bus
        .read_all(events::DOCUMENT_REQUEST_STREAM)
        .unwrap()
        .iter()
        .filter_map(DocumentRequestEvent::from_fields)
        .collect();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].session_id, "s1");
    // The request carries the full transcript buffer, not just the
    // final increment.
    assert!(requests[0].transcript.contains("some earlier thoughts"));
    assert!(requests[0].transcript.contains("stop recording"));

    let commands = bus.read_all(events::COMMAND_STREAM).unwrap();
    assert!(commands
        .iter()
        .any(|e| e.fields.get("command").map(String::as_str) == Some("recording_stopped")));

    task.abort();
}

#[tokio::test]
async fn stop_phrase_beats_content_phrases_in_same_increment() {
    let bus = Arc::new(StreamBus::new(10_000));
    let registry = Arc::new(SessionRegistry::new());
    registry.get_or_create("s1");

    let task = start_detector(&bus, &registry, TriggerConfig::default());
    tokio::time::sleep(Duration::from_millis(100)).await;

    publish_transcript(
        &bus,
        &registry,
        "s1",
        "that was interesting, what do you think, anyway stop recording",
    )
    .await;

    for _ in 0..250 {
        if !bus
            .read_all(events::DOCUMENT_REQUEST_STREAM)
            .unwrap()
            .is_empty()
        {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    // The terminal phrase won; no content trigger fired for the increment.
    assert_eq!(bus.read_all(events::DOCUMENT_REQUEST_STREAM).unwrap().len(), 1);
    assert!(bus.read_all(events::TRIGGER_STREAM).unwrap().is_empty());

    task.abort();
}
