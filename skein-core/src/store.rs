//! The `EventStore` protocol — durable, append-only persistence of a
//! session's event log.
//!
//! Deliberately minimal: append, three read shapes, and session
//! bookkeeping. Concrete backends (an in-memory map for tests, a SQL
//! table, a file tree) live in their own crates and implement this
//! trait; nothing in this kernel depends on which one is in use.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::event::Event;
use crate::id::SessionId;

/// Append-only, per-session event persistence.
///
/// Implementations MUST serialize concurrent appends for the same
/// session (a session's log is a total order); appends to different
/// sessions are independent and may proceed concurrently.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event to a session's log, returning the zero-based
    /// position it was written at.
    async fn append(&self, session_id: &SessionId, event: Event) -> Result<u64, StoreError>;

    /// Every event for a session, in insertion order. A session with
    /// no recorded events returns an empty vec, not an error — reading
    /// a session that was never created is indistinguishable from
    /// reading one with no events yet.
    async fn get_all(&self, session_id: &SessionId) -> Result<Vec<Event>, StoreError>;

    /// Events for a session starting at `position` (inclusive),
    /// in insertion order.
    async fn get_from(
        &self,
        session_id: &SessionId,
        position: u64,
    ) -> Result<Vec<Event>, StoreError>;

    /// Every session id the store currently holds events for.
    async fn list_sessions(&self) -> Result<Vec<SessionId>, StoreError>;

    /// Delete a session's entire log. No-op if the session is unknown.
    async fn delete_session(&self, session_id: &SessionId) -> Result<(), StoreError>;
}
