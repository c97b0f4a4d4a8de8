//! In-memory session registry.

use std::{
    collections::HashMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata for one model-backed conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Unique session key.
    pub key: String,
    /// Free-form status reported by the backend.
    pub status: String,
    /// Model identifier backing the session.
    pub model: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Create a session stamped with the current time.
    #[must_use]
    pub fn new(key: impl Into<String>, status: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            status: status.into(),
            model: model.into(),
            created_at: Utc::now(),
        }
    }
}

/// Session map shared by every gateway connection of one bridge.
///
/// Data is lost on restart. Readers copy the map out under the lock and
/// serialize after releasing it.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // Recovers from poisoning.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or replace a session, returning the previous entry.
    pub fn insert(&self, session: Session) -> Option<Session> {
        self.lock().insert(session.key.clone(), session)
    }

    /// Remove a session by key.
    pub fn remove(&self, key: &str) -> Option<Session> {
        self.lock().remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of every session, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Session> {
        let mut list: Vec<Session> = self.lock().values().cloned().collect();
        list.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.key.cmp(&b.key))
        });
        list
    }
}
