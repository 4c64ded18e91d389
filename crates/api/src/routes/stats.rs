//! Aggregate statistics endpoints.

use axum::{extract::Query, extract::State, Json};
use serde::Deserialize;
use tracing::error;

use analytics_core::limits::{clamp_timeseries, DEFAULT_WINDOW_MINUTES};
use stats_engine::Overview;

use crate::extractors::AuthContext;
use crate::response::{ApiError, DevicesResponse, LocationsResponse, TimeseriesResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowParams {
    pub since_minutes: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesParams {
    pub interval_minutes: Option<i64>,
    pub total_minutes: Option<i64>,
}

fn window_or_default(since_minutes: Option<i64>) -> i64 {
    since_minutes.filter(|v| *v > 0).unwrap_or(DEFAULT_WINDOW_MINUTES)
}

/// GET /api/stats/overview - Dashboard counters.
pub async fn overview_handler(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<WindowParams>,
) -> Result<Json<Overview>, ApiError> {
    let overview = state
        .stats
        .overview(params.since_minutes)
        .await
        .map_err(|e| {
            error!(error = %e, "overview aggregation failed");
            ApiError::from(e)
        })?;
    Ok(Json(overview))
}

/// GET /api/stats/timeseries - Bucketed event counts over the trailing
/// window; echoes the clamped parameters so the caller knows what it got.
pub async fn timeseries_handler(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<TimeseriesParams>,
) -> Result<Json<TimeseriesResponse>, ApiError> {
    let (interval_minutes, total_minutes) =
        clamp_timeseries(params.interval_minutes, params.total_minutes);

    let series = state
        .stats
        .timeseries(params.interval_minutes, params.total_minutes)
        .await
        .map_err(|e| {
            error!(error = %e, "timeseries aggregation failed");
            ApiError::from(e)
        })?;

    Ok(Json(TimeseriesResponse {
        series,
        interval_minutes,
        total_minutes,
    }))
}

/// GET /api/stats/devices - Device breakdown, count descending.
pub async fn devices_handler(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<WindowParams>,
) -> Result<Json<DevicesResponse>, ApiError> {
    let devices = state
        .stats
        .device_breakdown(params.since_minutes)
        .await
        .map_err(|e| {
            error!(error = %e, "device aggregation failed");
            ApiError::from(e)
        })?;

    Ok(Json(DevicesResponse {
        devices,
        window_minutes: window_or_default(params.since_minutes),
    }))
}

/// GET /api/stats/locations - Location breakdown, count descending.
pub async fn locations_handler(
    State(state): State<AppState>,
    _auth: AuthContext,
    Query(params): Query<WindowParams>,
) -> Result<Json<LocationsResponse>, ApiError> {
    let locations = state
        .stats
        .location_breakdown(params.since_minutes)
        .await
        .map_err(|e| {
            error!(error = %e, "location aggregation failed");
            ApiError::from(e)
        })?;

    Ok(Json(LocationsResponse {
        locations,
        window_minutes: window_or_default(params.since_minutes),
    }))
}
