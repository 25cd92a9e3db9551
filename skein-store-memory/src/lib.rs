#![deny(missing_docs)]
//! In-memory implementation of `skein_core::EventStore`.
//!
//! Uses a `HashMap<SessionId, Vec<Event>>` behind a `RwLock`. Suitable
//! for tests and single-process prototypes; it holds no durability
//! guarantee beyond the process's lifetime.

use std::collections::HashMap;

use async_trait::async_trait;
use skein_core::{Event, EventStore, SessionId, StoreError};
use tokio::sync::RwLock;

/// In-memory event store backed by a `HashMap` behind a `RwLock`.
pub struct MemoryEventStore {
    sessions: RwLock<HashMap<SessionId, Vec<Event>>>,
}

impl MemoryEventStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryEventStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, session_id: &SessionId, event: Event) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let log = sessions.entry(session_id.clone()).or_default();
        log.push(event);
        Ok((log.len() - 1) as u64)
    }

    async fn get_all(&self, session_id: &SessionId) -> Result<Vec<Event>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned().unwrap_or_default())
    }

    async fn get_from(
        &self,
        session_id: &SessionId,
        position: u64,
    ) -> Result<Vec<Event>, StoreError> {
        let sessions = self.sessions.read().await;
        let log = match sessions.get(session_id) {
            Some(log) => log,
            None => return Ok(Vec::new()),
        };
        let start = position as usize;
        Ok(log.get(start..).map(|s| s.to_vec()).unwrap_or_default())
    }

    async fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().cloned().collect())
    }

    async fn delete_session(&self, session_id: &SessionId) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }
}
