//! Activity ingestion and query endpoints.

use axum::{extract::Query, extract::State, http::StatusCode, Json};
use serde::Deserialize;
use tracing::{debug, error};
use validator::Validate;

use analytics_core::{
    limits::{DEFAULT_RECENT_EVENTS, MAX_RECENT_EVENTS},
    NewEvent,
};
use event_store::EventStore;
use realtime_hub::ActivityPayload;
use session_tracker::TrackSignal;

use crate::extractors::{AuthContext, ClientIp};
use crate::response::{ApiError, RecentActivitiesResponse, TrackResponse};
use crate::state::AppState;

/// POST /api/activities/track - Primary tracking endpoint.
///
/// Runs the signal through the session lifecycle manager; session
/// create/reopen/close and the paired event land in one call.
pub async fn track_handler(
    State(state): State<AppState>,
    auth: AuthContext,
    ClientIp(client_ip): ClientIp,
    Json(mut signal): Json<TrackSignal>,
) -> Result<(StatusCode, Json<TrackResponse>), ApiError> {
    if signal.location.ip.is_none() {
        signal.location.ip = client_ip;
    }

    debug!(
        user_id = %auth.identity.id,
        kind = ?signal.kind,
        "tracking signal received"
    );

    let outcome = state
        .tracker
        .record(Some(&auth.identity), signal)
        .await
        .map_err(|e| {
            error!(error = %e, "failed to record activity");
            ApiError::from(e)
        })?;

    Ok((
        StatusCode::CREATED,
        Json(TrackResponse {
            id: outcome.event.id,
            session_id: outcome.session_id,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct RecentParams {
    pub limit: Option<usize>,
}

/// GET /api/activities/recent - Last N events, newest first.
pub async fn recent_handler(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<RecentParams>,
) -> Result<Json<RecentActivitiesResponse>, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_RECENT_EVENTS)
        .min(MAX_RECENT_EVENTS);

    let events = state.store.recent_events(limit).await?;
    let activities = events.iter().map(ActivityPayload::from).collect();

    Ok(Json(RecentActivitiesResponse { activities }))
}

/// POST /api/activities - Admin-only synthetic event create.
///
/// Bypasses the session lifecycle manager; the event is stored verbatim and
/// still flows out through the change feed like any other insert.
pub async fn create_handler(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(event): Json<NewEvent>,
) -> Result<(StatusCode, Json<ActivityPayload>), ApiError> {
    auth.require_admin()?;

    event
        .validate()
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let stored = state.store.insert_event(event).await?;

    Ok((StatusCode::CREATED, Json(ActivityPayload::from(&stored))))
}
