//! In-process store backend with a replayable change log.
//!
//! Changes are assigned monotonically increasing sequence numbers (the resume
//! tokens) and kept in a bounded log per collection, so a subscriber that
//! resumes with a recent token replays exactly what it missed. Tokens that
//! have fallen off the log are rejected as invalidated, which forces the
//! subscriber to restart from "now".

use std::collections::{HashMap, VecDeque};
use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use analytics_core::{ActivityEvent, Error, NewEvent, NewSession, Result, Session};
use async_trait::async_trait;

use crate::feed::{Change, ChangeFeed, ChangeOp, ResumeToken};
use crate::EventStore;

/// Retained changes per collection; resuming further back than this is a
/// token invalidation.
const DEFAULT_LOG_CAPACITY: usize = 1024;

struct Watched<T> {
    log: VecDeque<Change<T>>,
    /// Token of the most recent change dropped from the bounded log. A
    /// resume token at or before this point cannot be replayed losslessly.
    pruned_through: u64,
    watchers: Vec<mpsc::UnboundedSender<Change<T>>>,
}

impl<T: Clone> Watched<T> {
    fn new() -> Self {
        Self {
            log: VecDeque::new(),
            pruned_through: 0,
            watchers: Vec::new(),
        }
    }

    fn publish(&mut self, change: Change<T>, capacity: usize) {
        self.log.push_back(change.clone());
        while self.log.len() > capacity {
            if let Some(dropped) = self.log.pop_front() {
                self.pruned_through = dropped.token.seq();
            }
        }
        self.watchers.retain(|tx| tx.send(change.clone()).is_ok());
    }

    /// Replays everything after `resume` (when valid) and registers a live
    /// watcher.
    fn subscribe(&mut self, resume: Option<ResumeToken>) -> Result<ChangeFeed<T>> {
        if let Some(token) = resume {
            if token.seq() < self.pruned_through {
                return Err(Error::token_invalidated(format!(
                    "token {} predates retained history (pruned through {})",
                    token.seq(),
                    self.pruned_through
                )));
            }
        }

        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(token) = resume {
            for change in self.log.iter().filter(|c| c.token > token) {
                // Receiver is brand new; send cannot fail here.
                let _ = tx.send(change.clone());
            }
        }
        self.watchers.push(tx);
        Ok(ChangeFeed::new(rx))
    }

    /// Drops every live watcher, ending their feeds mid-stream.
    fn interrupt(&mut self) {
        self.watchers.clear();
    }
}

struct Inner {
    events: Vec<ActivityEvent>,
    sessions: HashMap<Uuid, Session>,
    seq: u64,
    event_feed: Watched<ActivityEvent>,
    session_feed: Watched<Session>,
    connected: bool,
    fail_writes: bool,
    fail_reads: bool,
}

/// In-memory `EventStore` backend.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    log_capacity: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_log_capacity(DEFAULT_LOG_CAPACITY)
    }

    /// A store retaining at most `log_capacity` changes per collection.
    pub fn with_log_capacity(log_capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                events: Vec::new(),
                sessions: HashMap::new(),
                seq: 0,
                event_feed: Watched::new(),
                session_feed: Watched::new(),
                connected: true,
                fail_writes: false,
                fail_reads: false,
            })),
            log_capacity,
        }
    }

    /// Simulates the store going away: watch calls fail with `NotConnected`
    /// and writes fail until `reconnect`.
    pub fn disconnect(&self) {
        self.inner.lock().connected = false;
    }

    pub fn reconnect(&self) {
        self.inner.lock().connected = true;
    }

    /// Drops all live subscriptions without touching data, simulating a
    /// transient watch-stream failure.
    pub fn interrupt_watchers(&self) {
        let mut inner = self.inner.lock();
        inner.event_feed.interrupt();
        inner.session_feed.interrupt();
        debug!("interrupted all change-feed watchers");
    }

    /// Makes subsequent writes fail with `Error::Storage` (test toggle).
    pub fn set_fail_writes(&self, fail: bool) {
        self.inner.lock().fail_writes = fail;
    }

    /// Makes subsequent reads fail (test toggle for aggregation errors).
    pub fn set_fail_reads(&self, fail: bool) {
        self.inner.lock().fail_reads = fail;
    }

    pub fn event_count(&self) -> usize {
        self.inner.lock().events.len()
    }

    fn check_write(inner: &Inner) -> Result<()> {
        if !inner.connected {
            return Err(Error::storage("store not connected"));
        }
        if inner.fail_writes {
            return Err(Error::storage("write failure injected"));
        }
        Ok(())
    }

    fn check_read(inner: &Inner) -> Result<()> {
        if !inner.connected {
            return Err(Error::storage("store not connected"));
        }
        if inner.fail_reads {
            return Err(Error::storage("read failure injected"));
        }
        Ok(())
    }

    fn next_token(inner: &mut Inner) -> ResumeToken {
        inner.seq += 1;
        ResumeToken::new(inner.seq)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, event: NewEvent) -> Result<ActivityEvent> {
        let mut inner = self.inner.lock();
        Self::check_write(&inner)?;

        let now = Utc::now();
        let kind = event.kind_or_default();
        let stored = ActivityEvent {
            id: Uuid::new_v4(),
            user_id: event.user_id,
            email: event.email,
            session_id: event.session_id,
            kind,
            page: event.page,
            path: event.path,
            referrer: event.referrer,
            device: event.device,
            location: event.location,
            extra: event.extra,
            occurred_at: event.occurred_at.unwrap_or(now),
            created_at: now,
        };
        inner.events.push(stored.clone());

        let token = Self::next_token(&mut inner);
        let capacity = self.log_capacity;
        inner.event_feed.publish(
            Change {
                token,
                op: ChangeOp::Insert,
                doc: stored.clone(),
            },
            capacity,
        );
        Ok(stored)
    }

    async fn create_session(&self, session: NewSession) -> Result<Session> {
        let mut inner = self.inner.lock();
        Self::check_write(&inner)?;

        let now = Utc::now();
        let stored = Session {
            id: Uuid::new_v4(),
            user_id: session.user_id,
            email: session.email,
            device: session.device,
            location: session.location,
            path: session.path,
            referrer: session.referrer,
            started_at: session.started_at.unwrap_or(now),
            ended_at: None,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        inner.sessions.insert(stored.id, stored.clone());

        let token = Self::next_token(&mut inner);
        let capacity = self.log_capacity;
        inner.session_feed.publish(
            Change {
                token,
                op: ChangeOp::Insert,
                doc: stored.clone(),
            },
            capacity,
        );
        Ok(stored)
    }

    async fn reopen_session(&self, id: Uuid, session: NewSession) -> Result<Session> {
        let mut inner = self.inner.lock();
        Self::check_write(&inner)?;

        let now = Utc::now();
        let (stored, op) = match inner.sessions.get_mut(&id) {
            Some(existing) => {
                existing.reopen(&session);
                (existing.clone(), ChangeOp::Update)
            }
            None => {
                let created = Session {
                    id,
                    user_id: session.user_id,
                    email: session.email,
                    device: session.device,
                    location: session.location,
                    path: session.path,
                    referrer: session.referrer,
                    started_at: session.started_at.unwrap_or(now),
                    ended_at: None,
                    is_active: true,
                    created_at: now,
                    updated_at: now,
                };
                inner.sessions.insert(id, created.clone());
                (created, ChangeOp::Insert)
            }
        };

        let token = Self::next_token(&mut inner);
        let capacity = self.log_capacity;
        inner.session_feed.publish(
            Change {
                token,
                op,
                doc: stored.clone(),
            },
            capacity,
        );
        Ok(stored)
    }

    async fn close_session(&self, id: Uuid, at: DateTime<Utc>) -> Result<Option<Session>> {
        let mut inner = self.inner.lock();
        Self::check_write(&inner)?;

        let stored = match inner.sessions.get_mut(&id) {
            Some(session) => {
                session.close(at);
                session.clone()
            }
            None => return Ok(None),
        };

        let token = Self::next_token(&mut inner);
        let capacity = self.log_capacity;
        inner.session_feed.publish(
            Change {
                token,
                op: ChangeOp::Update,
                doc: stored.clone(),
            },
            capacity,
        );
        Ok(Some(stored))
    }

    async fn find_session(&self, id: Uuid) -> Result<Option<Session>> {
        let inner = self.inner.lock();
        Self::check_read(&inner)?;
        Ok(inner.sessions.get(&id).cloned())
    }

    async fn active_session_count(&self) -> Result<u64> {
        let inner = self.inner.lock();
        Self::check_read(&inner)?;
        Ok(inner.sessions.values().filter(|s| s.is_active).count() as u64)
    }

    async fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<ActivityEvent>> {
        let inner = self.inner.lock();
        Self::check_read(&inner)?;
        Ok(inner
            .events
            .iter()
            .filter(|e| e.occurred_at >= since)
            .cloned()
            .collect())
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<ActivityEvent>> {
        let inner = self.inner.lock();
        Self::check_read(&inner)?;
        let mut events: Vec<ActivityEvent> = inner.events.clone();
        events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        events.truncate(limit);
        Ok(events)
    }

    async fn distinct_users_since(&self, since: Option<DateTime<Utc>>) -> Result<u64> {
        let inner = self.inner.lock();
        Self::check_read(&inner)?;
        let users: HashSet<&str> = inner
            .events
            .iter()
            .filter(|e| since.map(|s| e.occurred_at >= s).unwrap_or(true))
            .filter_map(|e| e.user_id.as_deref())
            .collect();
        Ok(users.len() as u64)
    }

    async fn watch_events(
        &self,
        resume: Option<ResumeToken>,
    ) -> Result<ChangeFeed<ActivityEvent>> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(Error::not_connected("cannot watch events"));
        }
        inner.event_feed.subscribe(resume)
    }

    async fn watch_sessions(&self, resume: Option<ResumeToken>) -> Result<ChangeFeed<Session>> {
        let mut inner = self.inner.lock();
        if !inner.connected {
            return Err(Error::not_connected("cannot watch sessions"));
        }
        inner.session_feed.subscribe(resume)
    }

    fn is_connected(&self) -> bool {
        self.inner.lock().connected
    }
}
