//! Health check endpoints.

use axum::{extract::State, http::StatusCode, Json};
use chrono::Utc;
use event_store::EventStore;
use telemetry::health;

use crate::response::HealthResponse;
use crate::state::AppState;

/// GET /health - Full health check.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: health().status(),
        store_connected: state.store.is_connected(),
        relay_healthy: health().relay.is_healthy(),
        timestamp: Utc::now(),
    })
}

/// GET /health/ready - Readiness probe (can accept traffic).
pub async fn ready_handler() -> StatusCode {
    if health().is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// GET /health/live - Liveness probe. Answering at all is the proof.
pub async fn live_handler() -> StatusCode {
    StatusCode::OK
}
