//! Aggregation window bounds and fan-out limits.

/// Smallest timeseries bucket width (minutes).
pub const MIN_INTERVAL_MINUTES: i64 = 1;

/// Largest timeseries bucket width: one day (minutes).
pub const MAX_INTERVAL_MINUTES: i64 = 60 * 24;

/// Largest lookback for the timeseries: seven days (minutes).
pub const MAX_TOTAL_MINUTES: i64 = 60 * 24 * 7;

/// Defaults when the caller omits or mangles the parameters.
pub const DEFAULT_INTERVAL_MINUTES: i64 = 5;
pub const DEFAULT_TOTAL_MINUTES: i64 = 60;

/// Default lookback for overview and breakdown queries (minutes).
pub const DEFAULT_WINDOW_MINUTES: i64 = 60;

/// Breakdown truncation.
pub const MAX_DEVICE_GROUPS: usize = 50;
pub const MAX_LOCATION_GROUPS: usize = 100;

/// Cap on `GET /api/activities/recent?limit=`.
pub const MAX_RECENT_EVENTS: usize = 200;
pub const DEFAULT_RECENT_EVENTS: usize = 50;

/// Clamps the timeseries parameters: interval to [1, 1440] minutes, total to
/// [interval, 10080] minutes.
pub fn clamp_timeseries(interval_minutes: Option<i64>, total_minutes: Option<i64>) -> (i64, i64) {
    let interval = interval_minutes
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_INTERVAL_MINUTES)
        .clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES);
    let total = total_minutes
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_TOTAL_MINUTES)
        .clamp(interval, MAX_TOTAL_MINUTES);
    (interval, total)
}
