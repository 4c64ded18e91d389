//! Application state shared across handlers.

use std::sync::Arc;

use event_store::EventStore;
use realtime_hub::{AuthKeys, Hub, RealtimeState};
use session_tracker::SessionTracker;
use stats_engine::StatsEngine;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Storage contract (in-memory backend in the single-node deployment)
    pub store: Arc<dyn EventStore>,
    /// Session lifecycle manager
    pub tracker: Arc<SessionTracker>,
    /// Aggregation engine
    pub stats: StatsEngine,
    /// Realtime fan-out hub
    pub hub: Arc<Hub>,
    /// Bearer-token verification keys
    pub keys: Arc<AuthKeys>,
}

impl AppState {
    pub fn new(store: Arc<dyn EventStore>, hub: Arc<Hub>, keys: Arc<AuthKeys>) -> Self {
        Self {
            tracker: Arc::new(SessionTracker::new(store.clone())),
            stats: StatsEngine::new(store.clone()),
            store,
            hub,
            keys,
        }
    }

    /// State slice for the `/realtime` WebSocket route.
    pub fn realtime_state(&self) -> RealtimeState {
        RealtimeState {
            hub: self.hub.clone(),
            keys: self.keys.clone(),
        }
    }
}
