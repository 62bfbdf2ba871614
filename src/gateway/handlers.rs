use super::protocol::{InboundMessage, OutboundMessage, RecordingStatus};
use super::state::AppState;
use crate::bus::events::{self, AudioChunkEvent, CommandEvent};
use crate::session::{SessionHandle, SessionState};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json},
};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub state: String,
    pub started_at: String,
    pub last_activity: String,
    pub buffered_chunks: usize,
    pub transcript_chars: usize,
}

#[derive(Debug, Serialize)]
pub struct SessionTranscriptResponse {
    pub session_id: String,
    pub transcript: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// WebSocket handling
// ============================================================================

/// GET /ws
/// Upgrade the connection and run the per-client session loop
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: AppState) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let handle = state.registry.get_or_create(&session_id);

    info!("New client connected: {}", session_id);

    let (mut sink, mut source) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();

    // Writer task: drains the outbound channel into the socket. The
    // sender stored in the session is what the ResponseRouter uses to
    // reach this client.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to serialize outbound message: {}", e);
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    handle.with(|s| s.outbound = Some(tx.clone())).await;

    let _ = tx.send(OutboundMessage::SessionStarted {
        session_id: session_id.clone(),
        timestamp: events::now_rfc3339(),
    });

    while let Some(message) = source.next().await {
        match message {
            Ok(Message::Text(text)) => {
                process_message(&state, &handle, &tx, &text).await;
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {} // ignore binary/ping/pong frames
            Err(e) => {
                warn!("WebSocket error for session {}: {}", session_id, e);
                break;
            }
        }
    }

    cleanup_session(&state, &handle).await;
    writer.abort();
    info!("Client disconnected: {}", session_id);
}

/// Dispatch one inbound message. Malformed messages are dropped with a
/// warning; the connection stays open.
async fn process_message(
    state: &AppState,
    handle: &SessionHandle,
    tx: &mpsc::UnboundedSender<OutboundMessage>,
    text: &str,
) {
    let message: InboundMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Dropping malformed message from {}: {}", handle.id(), e);
            return;
        }
    };

    match message {
        InboundMessage::AudioChunk {
            audio,
            sequence,
            timestamp,
        } => {
            let event = AudioChunkEvent {
                session_id: handle.id().to_string(),
                chunk: audio,
                sequence,
                timestamp: timestamp.unwrap_or_else(events::now_rfc3339),
            };
            if let Err(e) = state.bus.append(events::AUDIO_STREAM, event.to_fields()) {
                warn!("Failed to append audio chunk for {}: {}", handle.id(), e);
            }
        }

        InboundMessage::RecordingStatus { status } => {
            handle
                .with(|s| {
                    s.state = match status {
                        RecordingStatus::Started => SessionState::Recording,
                        RecordingStatus::Stopped => SessionState::Stopped,
                    };
                    s.touch();
                })
                .await;

            let command = format!("recording_{}", status);
            append_command(state, handle.id(), &command);
            if status == RecordingStatus::Stopped {
                append_command(state, handle.id(), "session_ended");
            }

            let _ = tx.send(OutboundMessage::StatusConfirmed {
                status,
                timestamp: events::now_rfc3339(),
            });
        }

        InboundMessage::Ping => {
            let _ = tx.send(OutboundMessage::Pong {
                timestamp: events::now_rfc3339(),
            });
        }
    }
}

/// Socket closed: mark the session stopped and drop the connection
/// sender. The session itself stays registered so late responses can
/// still be attempted; the reaper retires it later.
async fn cleanup_session(state: &AppState, handle: &SessionHandle) {
    handle
        .with(|s| {
            if matches!(s.state, SessionState::Connected | SessionState::Recording) {
                s.state = SessionState::Stopped;
            }
            s.outbound = None;
            s.touch();
        })
        .await;

    append_command(state, handle.id(), "session_ended");
}

fn append_command(state: &AppState, session_id: &str, command: &str) {
    let event = CommandEvent::new(session_id, command);
    if let Err(e) = state.bus.append(events::COMMAND_STREAM, event.to_fields()) {
        warn!("Failed to append command {} for {}: {}", command, session_id, e);
    }
}

// ============================================================================
// Session queries
// ============================================================================

/// GET /sessions/:session_id/status
pub async fn get_session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&session_id) {
        Some(handle) => {
            let status = handle
                .with(|s| SessionStatusResponse {
                    session_id: s.id.clone(),
                    state: s.state.to_string(),
                    started_at: s.started_at.to_rfc3339(),
                    last_activity: s.last_activity.to_rfc3339(),
                    buffered_chunks: s.audio_buffer.len(),
                    transcript_chars: s.transcript.chars().count(),
                })
                .await;
            match status {
                Some(status) => (StatusCode::OK, Json(status)).into_response(),
                None => session_not_found(&session_id),
            }
        }
        None => session_not_found(&session_id),
    }
}

/// GET /sessions/:session_id/transcript
pub async fn get_session_transcript(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> impl IntoResponse {
    match state.registry.get(&session_id) {
        Some(handle) => {
            let transcript = handle.with(|s| s.transcript.clone()).await;
            match transcript {
                Some(transcript) => (
                    StatusCode::OK,
                    Json(SessionTranscriptResponse {
                        session_id,
                        transcript,
                    }),
                )
                    .into_response(),
                None => session_not_found(&session_id),
            }
        }
        None => session_not_found(&session_id),
    }
}

fn session_not_found(session_id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            error: format!("Session {} not found", session_id),
        }),
    )
        .into_response()
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
