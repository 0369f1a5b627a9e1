//! In-process session registry.
//!
//! Sessions are ephemeral, identifier-keyed conversation scopes,
//! distinct from persisted conversation records. An entry is created
//! lazily on first lookup, seeded with one assistant welcome message,
//! and lives until evicted or the process restarts.
//!
//! Each history sits behind its own `tokio::sync::Mutex`: a caller
//! holds the session lock for the whole turn (append → render →
//! complete → append), serializing turns within one session while
//! leaving different sessions fully concurrent.

use crate::window::last_n;
use mentora_core::message::{ChatHistory, ChatMessage, Role};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

struct SessionEntry {
    history: Arc<Mutex<ChatHistory>>,
    /// Monotonic creation sequence, used for oldest-first eviction.
    seq: u64,
}

/// A bounded registry of live chat sessions.
///
/// The source system this replaces grew its session map without
/// bound; here the capacity is explicit and the oldest-created entry
/// is evicted when it is reached.
pub struct SessionStore {
    capacity: usize,
    welcome: String,
    next_seq: std::sync::atomic::AtomicU64,
    sessions: RwLock<HashMap<String, SessionEntry>>,
}

impl SessionStore {
    /// Create a store that seeds new sessions with `welcome` and holds
    /// at most `capacity` of them.
    pub fn new(capacity: usize, welcome: impl Into<String>) -> Self {
        Self {
            capacity: capacity.max(1),
            welcome: welcome.into(),
            next_seq: std::sync::atomic::AtomicU64::new(0),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch the history for `session_id`, creating and seeding it on
    /// first reference. Idempotent per id: repeated calls return the
    /// same underlying log, not a copy.
    pub async fn get_or_create(&self, session_id: &str) -> Arc<Mutex<ChatHistory>> {
        {
            let sessions = self.sessions.read().await;
            if let Some(entry) = sessions.get(session_id) {
                return entry.history.clone();
            }
        }

        let mut sessions = self.sessions.write().await;
        // Re-check under the write lock: another task may have won the race.
        if let Some(entry) = sessions.get(session_id) {
            return entry.history.clone();
        }

        if sessions.len() >= self.capacity
            && let Some(oldest) = sessions
                .iter()
                .min_by_key(|(_, e)| e.seq)
                .map(|(k, _)| k.clone())
        {
            debug!(session = %oldest, "Session capacity reached, evicting oldest");
            sessions.remove(&oldest);
        }

        let mut history = ChatHistory::new();
        history.push(Role::Assistant, self.welcome.clone());

        let entry = SessionEntry {
            history: Arc::new(Mutex::new(history)),
            seq: self
                .next_seq
                .fetch_add(1, std::sync::atomic::Ordering::Relaxed),
        };
        let history = entry.history.clone();
        sessions.insert(session_id.to_string(), entry);
        debug!(session = %session_id, "Session created");
        history
    }

    /// Append one message to the session's history.
    pub async fn append(&self, session_id: &str, role: Role, content: impl Into<String>) {
        let history = self.get_or_create(session_id).await;
        history.lock().await.push(role, content);
    }

    /// The full history of a session, as an owned snapshot.
    pub async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        let history = self.get_or_create(session_id).await;
        let guard = history.lock().await;
        guard.messages().to_vec()
    }

    /// The recency window applied to the full history.
    pub async fn get_last_n(&self, session_id: &str, n: usize) -> Vec<ChatMessage> {
        let history = self.get_or_create(session_id).await;
        let guard = history.lock().await;
        last_n(guard.messages(), n).to_vec()
    }

    /// Number of live sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
