//! Storage contract for the live-analytics pipeline.
//!
//! The durable engine is an external collaborator; this crate owns the
//! contract the pipeline is written against: insert/update/query operations
//! on activity events and sessions, plus resumable change-feed subscriptions
//! on both collections. `MemoryStore` is the in-process backend used by the
//! single-node deployment and the test suite.

pub mod feed;
pub mod memory;

pub use feed::{Change, ChangeFeed, ChangeOp, ResumeToken};
pub use memory::MemoryStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use analytics_core::{ActivityEvent, NewEvent, NewSession, Result, Session};

/// Store operations consumed by the tracker, the stats engine, and the relay.
///
/// Watch calls fail with `Error::NotConnected` while the store is unreachable
/// and with `Error::TokenInvalidated` when a resume token points before the
/// retained change history. Write failures surface as `Error::Storage`.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends an immutable activity event; assigns id and `created_at`.
    async fn insert_event(&self, event: NewEvent) -> Result<ActivityEvent>;

    /// Creates a fresh session with a generated id.
    async fn create_session(&self, session: NewSession) -> Result<Session>;

    /// Upserts the session with the given id: re-activates it, clears
    /// `ended_at`, refreshes snapshot fields, and preserves the original
    /// `started_at` when the row already exists.
    async fn reopen_session(&self, id: Uuid, session: NewSession) -> Result<Session>;

    /// Idempotently closes a session. Returns `None` (not an error) when the
    /// id does not resolve.
    async fn close_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Session>>;

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>>;

    /// Point-in-time count of sessions with `is_active == true`.
    async fn active_session_count(&self) -> Result<u64>;

    /// All events with `occurred_at >= since`, unordered.
    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<ActivityEvent>>;

    /// Last `limit` events, newest first by `occurred_at`.
    async fn recent_events(&self, limit: usize) -> Result<Vec<ActivityEvent>>;

    /// Distinct non-null user ids among events, optionally window-scoped.
    async fn distinct_users_since(&self, since: Option<DateTime<Utc>>) -> Result<u64>;

    /// Subscribes to activity-event changes, optionally resuming after a
    /// previously observed token.
    async fn watch_events(
        &self,
        resume: Option<ResumeToken>,
    ) -> Result<ChangeFeed<ActivityEvent>>;

    /// Subscribes to session changes (insert/update/delete, any operation).
    async fn watch_sessions(&self, resume: Option<ResumeToken>) -> Result<ChangeFeed<Session>>;

    fn is_connected(&self) -> bool;
}
