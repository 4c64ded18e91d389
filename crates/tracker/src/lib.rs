//! Session lifecycle manager.
//!
//! Turns raw tracking signals (`session_start`, `page_view`, `session_end`,
//! `login`, ...) into session create/reopen/close operations plus a paired
//! activity event. Writes are idempotent per call but deliberately not
//! deduplicated across calls; the client layer owns not re-sending on an
//! unchanged route.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use analytics_core::{
    ActivityEvent, ActivityType, Device, Location, MetaMap, NewEvent, NewSession, Result,
    UserIdentity,
};
use event_store::EventStore;

/// One raw tracking signal from a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSignal {
    #[serde(rename = "type")]
    pub kind: Option<ActivityType>,
    pub session_id: Option<Uuid>,
    /// Event time; ingestion time when absent
    pub timestamp: Option<DateTime<Utc>>,
    pub path: Option<String>,
    pub referrer: Option<String>,
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub extra: MetaMap,
}

/// What a processed signal produced.
#[derive(Debug, Clone)]
pub struct TrackOutcome {
    pub event: ActivityEvent,
    /// Session the event is linked to, when one was created, reopened,
    /// closed, or referenced.
    pub session_id: Option<Uuid>,
}

/// Session Lifecycle Manager over the storage contract.
pub struct SessionTracker {
    store: Arc<dyn EventStore>,
}

impl SessionTracker {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Records one signal on behalf of an authenticated identity.
    ///
    /// Storage write failures propagate as `Error::Storage`; no partial
    /// session+event pair is retried here.
    pub async fn record(
        &self,
        identity: Option<&UserIdentity>,
        signal: TrackSignal,
    ) -> Result<TrackOutcome> {
        let kind = signal.kind.unwrap_or(ActivityType::PageView);
        let occurred_at = signal.timestamp.unwrap_or_else(Utc::now);

        let session_id = if kind.opens_session() {
            Some(self.open_session(identity, &signal, occurred_at).await?)
        } else if kind == ActivityType::SessionEnd {
            self.end_session(&signal, occurred_at).await?
        } else {
            signal.session_id
        };

        let event = self
            .store
            .insert_event(NewEvent {
                user_id: identity.map(|i| i.id.clone()),
                email: identity.map(|i| i.email.clone()),
                session_id,
                kind: Some(kind),
                page: signal.path.clone(),
                path: signal.path,
                referrer: signal.referrer,
                device: signal.device,
                location: signal.location,
                extra: signal.extra,
                occurred_at: Some(occurred_at),
            })
            .await?;

        debug!(
            kind = %kind,
            event_id = %event.id,
            session_id = ?session_id,
            "recorded activity"
        );

        Ok(TrackOutcome { event, session_id })
    }

    /// `session_start` / `login`: reopen the referenced session or create a
    /// fresh one with `started_at = occurred_at`.
    async fn open_session(
        &self,
        identity: Option<&UserIdentity>,
        signal: &TrackSignal,
        occurred_at: DateTime<Utc>,
    ) -> Result<Uuid> {
        let snapshot = NewSession {
            user_id: identity.map(|i| i.id.clone()),
            email: identity.map(|i| i.email.clone()),
            device: signal.device.clone(),
            location: signal.location.clone(),
            path: signal.path.clone(),
            referrer: signal.referrer.clone(),
            started_at: Some(occurred_at),
        };

        let session = match signal.session_id {
            Some(id) => self.store.reopen_session(id, snapshot).await?,
            None => self.store.create_session(snapshot).await?,
        };
        Ok(session.id)
    }

    /// `session_end`: close the referenced session. An unresolved session id
    /// must not fail the call; the event is simply recorded unlinked.
    async fn end_session(
        &self,
        signal: &TrackSignal,
        occurred_at: DateTime<Utc>,
    ) -> Result<Option<Uuid>> {
        let Some(id) = signal.session_id else {
            return Ok(None);
        };
        match self.store.close_session(id, occurred_at).await? {
            Some(session) => Ok(Some(session.id)),
            None => {
                warn!(session_id = %id, "session_end for unknown session");
                Ok(None)
            }
        }
    }
}
