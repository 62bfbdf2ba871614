//! Session state and ownership
//!
//! This module provides the two shared pieces of per-session state:
//! - `Session`: audio buffer, transcript buffer, lifecycle state, and
//!   the (possibly absent) handle to the client connection
//! - `SessionRegistry`: the single source of truth mapping session ids
//!   to live sessions, with generation counters that make stale
//!   handles inert after a session is reaped

mod registry;
mod session;

pub use registry::{SessionHandle, SessionRegistry};
pub use session::{Session, SessionState};
