//! Read-side aggregation over the event store.
//!
//! Four pure operations, each scoped to a caller-supplied lookback window on
//! `occurred_at` (event time, never storage time), plus a `snapshot` that
//! gathers all four for realtime publishing. Nothing here mutates state, and
//! every operation is safe to call concurrently; a store failure surfaces as
//! a typed `Aggregation` error for callers to catch and log.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use analytics_core::limits::{
    clamp_timeseries, DEFAULT_WINDOW_MINUTES, MAX_DEVICE_GROUPS, MAX_LOCATION_GROUPS,
};
use analytics_core::{ActivityEvent, Error, Result};
use event_store::EventStore;

const UNKNOWN: &str = "unknown";

/// High-level counters for the dashboard cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    /// Distinct users ever seen (not window-scoped)
    pub total_users: u64,
    /// Sessions currently active (point-in-time, not window-scoped)
    pub active_sessions: u64,
    /// Events inside the window
    pub events_count: u64,
    /// Distinct users that generated events inside the window
    pub unique_users: u64,
    pub window_minutes: i64,
}

/// One non-empty timeseries bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeBucket {
    /// Bucket start: event time floored to a multiple of the interval
    pub ts: DateTime<Utc>,
    pub count: u64,
    pub unique_users: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceGroup {
    pub device_type: String,
    pub os: String,
    pub browser: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationGroup {
    pub country: String,
    pub region: String,
    pub count: u64,
}

/// The full aggregate snapshot pushed on `stats:update`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub overview: Overview,
    pub timeseries: Vec<TimeBucket>,
    pub devices: Vec<DeviceGroup>,
    pub locations: Vec<LocationGroup>,
}

/// Aggregation engine over the storage contract.
#[derive(Clone)]
pub struct StatsEngine {
    store: Arc<dyn EventStore>,
}

impl StatsEngine {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    async fn window_events(&self, window_minutes: i64) -> Result<Vec<ActivityEvent>> {
        let since = Utc::now() - Duration::minutes(window_minutes);
        self.store
            .events_since(since)
            .await
            .map_err(|e| Error::aggregation(e.to_string()))
    }

    /// Overview counters. `active_sessions` and `total_users` are
    /// point-in-time facts; the rest are window-scoped.
    pub async fn overview(&self, window_minutes: Option<i64>) -> Result<Overview> {
        let window_minutes = window_minutes
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_WINDOW_MINUTES);
        let events = self.window_events(window_minutes).await?;

        let active_sessions = self
            .store
            .active_session_count()
            .await
            .map_err(|e| Error::aggregation(e.to_string()))?;
        let total_users = self
            .store
            .distinct_users_since(None)
            .await
            .map_err(|e| Error::aggregation(e.to_string()))?;

        let unique_users = events
            .iter()
            .filter_map(|e| e.user_id.as_deref())
            .collect::<HashSet<_>>()
            .len() as u64;

        Ok(Overview {
            total_users,
            active_sessions,
            events_count: events.len() as u64,
            unique_users,
            window_minutes,
        })
    }

    /// Fixed-interval, right-open buckets over the trailing window, ascending
    /// by bucket start, empty buckets omitted. Inputs are clamped to
    /// interval ∈ [1, 1440] and total ∈ [interval, 10080] minutes.
    pub async fn timeseries(
        &self,
        interval_minutes: Option<i64>,
        total_minutes: Option<i64>,
    ) -> Result<Vec<TimeBucket>> {
        let (interval, total) = clamp_timeseries(interval_minutes, total_minutes);
        let bucket_ms = interval * 60 * 1000;
        let events = self.window_events(total).await?;

        // BTreeMap keeps buckets ascending by start
        let mut buckets: BTreeMap<i64, (u64, HashSet<&str>)> = BTreeMap::new();
        for event in &events {
            let ms = event.occurred_at.timestamp_millis();
            let start = ms - ms.rem_euclid(bucket_ms);
            let entry = buckets.entry(start).or_default();
            entry.0 += 1;
            if let Some(user) = event.user_id.as_deref() {
                entry.1.insert(user);
            }
        }

        Ok(buckets
            .into_iter()
            .filter_map(|(start, (count, users))| {
                let ts = DateTime::<Utc>::from_timestamp_millis(start)?;
                Some(TimeBucket {
                    ts,
                    count,
                    unique_users: users.len() as u64,
                })
            })
            .collect())
    }

    /// Events grouped by (device_type, os, browser), `"unknown"` defaulting,
    /// count descending, top 50.
    pub async fn device_breakdown(&self, window_minutes: Option<i64>) -> Result<Vec<DeviceGroup>> {
        let window_minutes = window_minutes
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_WINDOW_MINUTES);
        let events = self.window_events(window_minutes).await?;

        let mut groups: HashMap<(String, String, String), u64> = HashMap::new();
        for event in &events {
            let key = (
                dim(event.device.device_type.as_deref()),
                dim(event.device.os.as_deref()),
                dim(event.device.browser.as_deref()),
            );
            *groups.entry(key).or_default() += 1;
        }

        let mut out: Vec<DeviceGroup> = groups
            .into_iter()
            .map(|((device_type, os, browser), count)| DeviceGroup {
                device_type,
                os,
                browser,
                count,
            })
            .collect();
        sort_desc(&mut out, |g| (g.count, g.device_type.clone(), g.os.clone()));
        out.truncate(MAX_DEVICE_GROUPS);
        Ok(out)
    }

    /// Events grouped by (country, region), `"unknown"` defaulting, count
    /// descending, top 100.
    pub async fn location_breakdown(
        &self,
        window_minutes: Option<i64>,
    ) -> Result<Vec<LocationGroup>> {
        let window_minutes = window_minutes
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_WINDOW_MINUTES);
        let events = self.window_events(window_minutes).await?;

        let mut groups: HashMap<(String, String), u64> = HashMap::new();
        for event in &events {
            let key = (
                dim(event.location.country.as_deref()),
                dim(event.location.region.as_deref()),
            );
            *groups.entry(key).or_default() += 1;
        }

        let mut out: Vec<LocationGroup> = groups
            .into_iter()
            .map(|((country, region), count)| LocationGroup {
                country,
                region,
                count,
            })
            .collect();
        sort_desc(&mut out, |g| (g.count, g.country.clone(), g.region.clone()));
        out.truncate(MAX_LOCATION_GROUPS);
        Ok(out)
    }

    /// All four views for the comprehensive `stats:update` payload.
    pub async fn snapshot(
        &self,
        window_minutes: Option<i64>,
        interval_minutes: Option<i64>,
    ) -> Result<Snapshot> {
        let (overview, timeseries, devices, locations) = tokio::try_join!(
            self.overview(window_minutes),
            self.timeseries(interval_minutes, window_minutes),
            self.device_breakdown(window_minutes),
            self.location_breakdown(window_minutes),
        )?;
        Ok(Snapshot {
            overview,
            timeseries,
            devices,
            locations,
        })
    }
}

fn dim(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => UNKNOWN.to_string(),
    }
}

/// Descending by count; the secondary key keeps equal counts deterministic.
fn sort_desc<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> (u64, K, K)) {
    items.sort_by(|a, b| {
        let (ca, ka1, ka2) = key(a);
        let (cb, kb1, kb2) = key(b);
        cb.cmp(&ca).then(ka1.cmp(&kb1)).then(ka2.cmp(&kb2))
    });
}
