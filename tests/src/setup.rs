//! Common test setup functions.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;

use analytics_core::{Role, UserIdentity};
use api::{router, AppState};
use change_relay::{ChangeFeedRelay, RelayConfig};
use event_store::{EventStore, MemoryStore};
use realtime_hub::{AuthKeys, Hub};
use stats_engine::StatsEngine;
use telemetry::health;

/// Token lifetime for test credentials.
fn token_ttl() -> chrono::Duration {
    chrono::Duration::hours(1)
}

/// Test context running the whole pipeline in-process.
///
/// Production code paths end to end: the real router with all middleware,
/// the real relay over the in-memory store, and the real fan-out hub. Only
/// the debounce windows are shortened so tests settle quickly.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub hub: Arc<Hub>,
    pub keys: Arc<AuthKeys>,
    pub relay: Arc<ChangeFeedRelay>,
    pub router: Router,
}

impl TestContext {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let hub = Arc::new(Hub::new());
        let keys = Arc::new(AuthKeys::new("integration-test-secret"));

        let relay = Arc::new(ChangeFeedRelay::new(
            store.clone() as Arc<dyn EventStore>,
            hub.clone(),
            StatsEngine::new(store.clone() as Arc<dyn EventStore>),
            RelayConfig {
                reopen_delay: Duration::from_millis(20),
                stats_debounce: Duration::from_millis(20),
                ..RelayConfig::default()
            },
        ));
        relay.start().expect("relay should start");

        health().store.set_healthy();
        health().hub.set_healthy();
        health().relay.set_healthy();

        let state = AppState::new(
            store.clone() as Arc<dyn EventStore>,
            hub.clone(),
            keys.clone(),
        );
        let router = router(state);

        Self {
            store,
            hub,
            keys,
            relay,
            router,
        }
    }

    /// Bearer token for a regular user.
    pub fn user_token(&self, user_id: &str) -> String {
        let identity = UserIdentity {
            id: user_id.to_string(),
            email: format!("{user_id}@example.com"),
            role: Role::User,
        };
        self.keys
            .issue(&identity, token_ttl())
            .expect("token should mint")
    }

    /// Bearer token for an admin.
    pub fn admin_token(&self) -> String {
        let identity = UserIdentity {
            id: "admin-1".to_string(),
            email: "admin@example.com".to_string(),
            role: Role::Admin,
        };
        self.keys
            .issue(&identity, token_ttl())
            .expect("token should mint")
    }
}
