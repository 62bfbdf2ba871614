//! WebSocket ingest gateway and HTTP API
//!
//! This module terminates client connections and exposes the service
//! endpoints:
//! - GET /ws - WebSocket endpoint for audio streaming clients
//! - GET /sessions/:id/status - Query session status
//! - GET /sessions/:id/transcript - Get accumulated transcript
//! - GET /health - Health check
//!
//! Each WebSocket connection owns exactly one session: the gateway
//! allocates the id, acknowledges with `session_started`, turns
//! inbound messages into bus appends tagged with that id, and marks
//! the session stopped when the socket closes.

mod handlers;
pub mod protocol;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
