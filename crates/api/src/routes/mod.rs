//! API routes.

pub mod activities;
pub mod health;
pub mod stats;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The realtime route authenticates during the handshake itself, so it
    // carries its own state slice instead of the AuthContext extractor.
    let realtime = Router::new()
        .route("/realtime", get(realtime_hub::realtime_handler))
        .with_state(state.realtime_state());

    Router::new()
        .route("/api/activities/track", post(activities::track_handler))
        .route("/api/activities/recent", get(activities::recent_handler))
        .route("/api/activities", post(activities::create_handler))
        .route("/api/stats/overview", get(stats::overview_handler))
        .route("/api/stats/timeseries", get(stats::timeseries_handler))
        .route("/api/stats/devices", get(stats::devices_handler))
        .route("/api/stats/locations", get(stats::locations_handler))
        .route("/health", get(health::health_handler))
        .route("/health/ready", get(health::ready_handler))
        .route("/health/live", get(health::live_handler))
        .with_state(state)
        .merge(realtime)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
