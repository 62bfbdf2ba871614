use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;
use tracing::debug;

use super::session::Session;

struct Entry {
    generation: u64,
    /// The generation currently live for this id. Zeroed on removal so
    /// every outstanding handle turns into a no-op.
    current: Arc<AtomicU64>,
    session: Arc<Mutex<Session>>,
}

/// Authoritative map from session id to session state.
///
/// All mutation goes through handles obtained here, so no two
/// components ever observe different in-memory copies of a session.
/// Generations start at 1; 0 marks a removed session.
pub struct SessionRegistry {
    entries: StdMutex<HashMap<String, Entry>>,
    next_generation: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            entries: StdMutex::new(HashMap::new()),
            next_generation: AtomicU64::new(1),
        }
    }

    /// Look up the session, creating it in `Connected` state if absent.
    pub fn get_or_create(&self, id: &str) -> SessionHandle {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        let entry = entries.entry(id.to_string()).or_insert_with(|| {
            let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
            debug!("Creating session {} (generation {})", id, generation);
            Entry {
                generation,
                current: Arc::new(AtomicU64::new(generation)),
                session: Arc::new(Mutex::new(Session::new(id.to_string()))),
            }
        });
        SessionHandle {
            id: id.to_string(),
            generation: entry.generation,
            current: Arc::clone(&entry.current),
            session: Arc::clone(&entry.session),
        }
    }

    /// Look up an existing session. Absence is a normal condition for
    /// late-arriving events, not an error.
    pub fn get(&self, id: &str) -> Option<SessionHandle> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        entries.get(id).map(|entry| SessionHandle {
            id: id.to_string(),
            generation: entry.generation,
            current: Arc::clone(&entry.current),
            session: Arc::clone(&entry.session),
        })
    }

    /// Remove the session and invalidate its generation, making every
    /// in-flight handle inert. Returns whether anything was removed.
    pub fn remove(&self, id: &str) -> bool {
        let mut entries = self.entries.lock().expect("registry lock poisoned");
        match entries.remove(id) {
            Some(entry) => {
                entry.current.store(0, Ordering::SeqCst);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all registered ids, for the reaper sweep.
    pub fn session_ids(&self) -> Vec<String> {
        let entries = self.entries.lock().expect("registry lock poisoned");
        entries.keys().cloned().collect()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// A non-owning reference to a registered session. Every operation
/// checks the generation counter first and becomes a no-op if the
/// session was removed since the handle was obtained.
#[derive(Clone)]
pub struct SessionHandle {
    id: String,
    generation: u64,
    current: Arc<AtomicU64>,
    session: Arc<Mutex<Session>>,
}

impl SessionHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_live(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    /// Run `f` against the session under its lock, or return `None`
    /// if the session was concurrently reaped.
    pub async fn with<T>(&self, f: impl FnOnce(&mut Session) -> T) -> Option<T> {
        if !self.is_live() {
            return None;
        }
        let mut session = self.session.lock().await;
        // Re-check under the lock: removal may have raced the wait.
        if !self.is_live() {
            return None;
        }
        Some(f(&mut session))
    }
}
