use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::{timeout, Instant};

/// Per-stream, log-assigned event id. Monotonically increasing within
/// one stream, usable as a resume cursor.
pub type EventId = u64;

/// A single entry in a stream: the id the log assigned plus the
/// producer's field map.
#[derive(Debug, Clone)]
pub struct StreamEvent {
    pub id: EventId,
    pub fields: HashMap<String, String>,
}

/// Bus failures. Appends and reads on the in-process bus do not fail
/// today, but every consumer treats `Transient` as retryable so the
/// contract holds if the log ever moves out of process.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    #[error("transient bus I/O failure: {0}")]
    Transient(String),
}

struct StreamState {
    next_id: EventId,
    entries: VecDeque<StreamEvent>,
    /// Signals the id of the newest appended event to blocked readers.
    tx: watch::Sender<EventId>,
}

impl StreamState {
    fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self {
            next_id: 1,
            entries: VecDeque::new(),
            tx,
        }
    }
}

/// Append-only, partitioned-by-name event log.
///
/// Each stream is independently length-bounded: once it exceeds the
/// configured maximum, the oldest entries are dropped. Consumers that
/// fall behind may miss evicted events; delivery is at-least-once for
/// consumers that keep up, and readers tolerate duplicates.
pub struct StreamBus {
    streams: Mutex<HashMap<String, StreamState>>,
    max_stream_len: usize,
}

impl StreamBus {
    pub fn new(max_stream_len: usize) -> Self {
        Self {
            streams: Mutex::new(HashMap::new()),
            max_stream_len,
        }
    }

    /// Append a field map to the named stream, returning the assigned id.
    pub fn append(
        &self,
        stream: &str,
        fields: HashMap<String, String>,
    ) -> Result<EventId, BusError> {
        let mut streams = self.streams.lock().expect("bus lock poisoned");
        let state = streams
            .entry(stream.to_string())
            .or_insert_with(StreamState::new);

        let id = state.next_id;
        state.next_id += 1;
        state.entries.push_back(StreamEvent { id, fields });

        while state.entries.len() > self.max_stream_len {
            state.entries.pop_front();
        }

        let _ = state.tx.send(id);
        Ok(id)
    }

    /// Read up to `max_count` events with id greater than `cursor`,
    /// blocking up to `block` for new events. Returns an empty batch on
    /// timeout; a timeout is not an error.
    pub async fn read(
        &self,
        stream: &str,
        cursor: EventId,
        block: Duration,
        max_count: usize,
    ) -> Result<Vec<StreamEvent>, BusError> {
        let deadline = Instant::now() + block;

        loop {
            let mut rx = {
                let mut streams = self.streams.lock().expect("bus lock poisoned");
                let state = streams
                    .entry(stream.to_string())
                    .or_insert_with(StreamState::new);

                let batch: Vec<StreamEvent> = state
                    .entries
                    .iter()
                    .filter(|e| e.id > cursor)
                    .take(max_count)
                    .cloned()
                    .collect();

                if !batch.is_empty() {
                    return Ok(batch);
                }

                // Subscribe while holding the lock so an append racing
                // with the wait below is observed by `changed()`.
                state.tx.subscribe()
            };

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Vec::new());
            }
            if timeout(remaining, rx.changed()).await.is_err() {
                return Ok(Vec::new());
            }
        }
    }

    /// Everything currently retained in the stream, oldest first.
    /// Used by document rendering to range-scan a whole stream.
    pub fn read_all(&self, stream: &str) -> Result<Vec<StreamEvent>, BusError> {
        let streams = self.streams.lock().expect("bus lock poisoned");
        Ok(streams
            .get(stream)
            .map(|s| s.entries.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Cursor positioned after the newest event currently in the
    /// stream. Reading from it yields only events appended later.
    pub fn tail_cursor(&self, stream: &str) -> EventId {
        let streams = self.streams.lock().expect("bus lock poisoned");
        streams.get(stream).map(|s| s.next_id - 1).unwrap_or(0)
    }
}
