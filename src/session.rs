//! # Sessions
//!
//! Per-conversation state: ordered history, the last code artifact and its
//! language. Handles are key-scoped `tokio::sync::Mutex`es; a caller that
//! holds the lock for the whole message turn gets single-writer-per-session
//! discipline, so history order matches lock-acquisition order even under
//! concurrent requests for the same id.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub type SessionId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

/// Accumulated state of one conversation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    pub history: Vec<Turn>,
    pub last_generated_code: Option<String>,
    pub language: String,
}

impl Session {
    fn new(language: impl Into<String>) -> Self {
        Self {
            history: Vec::new(),
            last_generated_code: None,
            language: language.into(),
        }
    }

    pub fn append_turn(&mut self, role: Role, content: impl Into<String>) {
        self.history.push(Turn {
            role,
            content: content.into(),
        });
    }
}

pub type SessionHandle = Arc<tokio::sync::Mutex<Session>>;

/// Capacity-bounded session map, session id → session. Sessions are created
/// lazily on first use and evicted least-recently-used past capacity.
pub struct SessionStore {
    sessions: Mutex<LruCache<SessionId, SessionHandle>>,
    default_language: String,
}

impl SessionStore {
    pub fn new(capacity: usize, default_language: impl Into<String>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            default_language: default_language.into(),
        }
    }

    /// Returns the handle for `session_id`, creating an empty session with
    /// the default language if none exists.
    pub fn get_or_create(&self, session_id: &str) -> SessionHandle {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = sessions.get(session_id) {
            return handle.clone();
        }
        debug!(session_id, "creating session");
        let handle: SessionHandle =
            Arc::new(tokio::sync::Mutex::new(Session::new(&self.default_language)));
        sessions.put(session_id.to_string(), handle.clone());
        handle
    }

    /// Appends one turn to the session's history, preserving order.
    pub async fn append_turn(&self, session_id: &str, role: Role, content: impl Into<String>) {
        let handle = self.get_or_create(session_id);
        let mut session = handle.lock().await;
        session.append_turn(role, content);
    }

    pub fn len(&self) -> usize {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
