// Tests for the client-facing WebSocket message shapes

use base64::Engine;
use voice_companion::gateway::protocol::{InboundMessage, OutboundMessage, RecordingStatus};

#[test]
fn audio_chunk_deserializes_from_client_json() {
    let json = r#"{
        "type": "audio_chunk",
        "audio": "UENNIGJ5dGVz",
        "sequence": 7,
        "timestamp": "2026-08-06T12:00:00Z"
    }"#;

    let message: InboundMessage = serde_json::from_str(json).unwrap();
    match message {
        InboundMessage::AudioChunk {
            audio,
            sequence,
            timestamp,
        } => {
            assert_eq!(audio, "UENNIGJ5dGVz");
            assert_eq!(sequence, 7);
            assert_eq!(timestamp.as_deref(), Some("2026-08-06T12:00:00Z"));
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn audio_chunk_fields_are_optional_except_audio() {
    let json = r#"{"type": "audio_chunk", "audio": "QQ=="}"#;
    let message: InboundMessage = serde_json::from_str(json).unwrap();
    match message {
        InboundMessage::AudioChunk {
            sequence,
            timestamp,
            ..
        } => {
            assert_eq!(sequence, 0);
            assert!(timestamp.is_none());
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn recording_status_carries_started_or_stopped() {
    let started: InboundMessage =
        serde_json::from_str(r#"{"type": "recording_status", "status": "started"}"#).unwrap();
    match started {
        InboundMessage::RecordingStatus { status } => {
            assert_eq!(status, RecordingStatus::Started);
            assert_eq!(status.to_string(), "started");
        }
        other => panic!("unexpected message: {:?}", other),
    }

    let stopped: InboundMessage =
        serde_json::from_str(r#"{"type": "recording_status", "status": "stopped"}"#).unwrap();
    match stopped {
        InboundMessage::RecordingStatus { status } => {
            assert_eq!(status, RecordingStatus::Stopped);
        }
        other => panic!("unexpected message: {:?}", other),
    }
}

#[test]
fn unknown_message_type_is_a_parse_error() {
    let result: Result<InboundMessage, _> =
        serde_json::from_str(r#"{"type": "selfdestruct"}"#);
    assert!(result.is_err());
}

#[test]
fn session_started_serializes_with_type_tag() {
    let message = OutboundMessage::SessionStarted {
        session_id: "abc-123".to_string(),
        timestamp: "2026-08-06T12:00:00Z".to_string(),
    };

    let json = serde_json::to_string(&message).unwrap();
    assert!(json.contains("\"type\":\"session_started\""));
    assert!(json.contains("\"session_id\":\"abc-123\""));
}

#[test]
fn audio_response_serializes_final_flag() {
    let message = OutboundMessage::AudioResponse {
        audio: "QUJD".to_string(),
        is_final: true,
        timestamp: "2026-08-06T12:00:00Z".to_string(),
    };

    let json = serde_json::to_string(&message).unwrap();
    assert!(json.contains("\"type\":\"audio_response\""));
    assert!(json.contains("\"is_final\":true"));
}

#[test]
fn conversation_document_serializes_filename_and_content() {
    let message = OutboundMessage::ConversationDocument {
        filename: "conversation-2026-08-06-120000.md".to_string(),
        content: "# Conversation".to_string(),
        timestamp: "2026-08-06T12:00:00Z".to_string(),
    };

    let json = serde_json::to_string(&message).unwrap();
    assert!(json.contains("\"type\":\"conversation_document\""));
    assert!(json.contains("conversation-2026-08-06-120000.md"));
}

#[test]
fn status_confirmed_echoes_the_status() {
    let message = OutboundMessage::StatusConfirmed {
        status: RecordingStatus::Started,
        timestamp: "2026-08-06T12:00:00Z".to_string(),
    };
    let json = serde_json::to_string(&message).unwrap();
    assert!(json.contains("\"type\":\"status_confirmed\""));
    assert!(json.contains("\"status\":\"started\""));
}

#[test]
fn base64_roundtrips_arbitrary_bytes() {
    let original: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();

    let encoded = base64::engine::general_purpose::STANDARD.encode(&original);
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(&encoded)
        .unwrap();

    assert_eq!(decoded, original);
}
