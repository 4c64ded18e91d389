//! Activity event type definitions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Discriminated activity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Login,
    Logout,
    PageView,
    Click,
    Navigation,
    SessionStart,
    SessionEnd,
}

impl ActivityType {
    /// Returns the wire name of the type (matches the `snake_case` serde form).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::PageView => "page_view",
            Self::Click => "click",
            Self::Navigation => "navigation",
            Self::SessionStart => "session_start",
            Self::SessionEnd => "session_end",
        }
    }

    /// Whether this type opens (or re-opens) a session.
    pub fn opens_session(&self) -> bool {
        matches!(self, Self::SessionStart | Self::Login)
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized device info captured with events and sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Device {
    /// Raw user agent string
    #[validate(length(max = 512))]
    pub ua: Option<String>,
    #[validate(length(max = 64))]
    pub os: Option<String>,
    #[validate(length(max = 64))]
    pub browser: Option<String>,
    /// desktop, mobile, tablet
    #[serde(rename = "deviceType")]
    #[validate(length(max = 32))]
    pub device_type: Option<String>,
}

/// Location info captured with events and sessions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct Location {
    #[validate(length(max = 45))]
    pub ip: Option<String>,
    #[validate(length(max = 64))]
    pub country: Option<String>,
    #[validate(length(max = 64))]
    pub region: Option<String>,
    #[validate(length(max = 128))]
    pub city: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Loosely-typed metadata value.
///
/// Free-form `extra` data is a flat map of these; consumers must not assume
/// any particular key exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

/// Flat metadata map attached to events.
pub type MetaMap = BTreeMap<String, MetaValue>;

/// A single immutable activity event.
///
/// Once persisted it is never mutated; `occurred_at` (event time) is the key
/// for all windowed aggregation, never `created_at` (storage time).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub id: Uuid,
    /// External-identity id snapshot (canonical key for unique-user counts)
    pub user_id: Option<String>,
    /// Email snapshot for display only
    pub email: Option<String>,
    pub session_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: ActivityType,
    pub page: Option<String>,
    pub path: Option<String>,
    pub referrer: Option<String>,
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub extra: MetaMap,
    /// Event time (caller-suppliable, defaults to ingestion time)
    pub occurred_at: DateTime<Utc>,
    /// Storage time
    pub created_at: DateTime<Utc>,
}

/// Event fields supplied by the caller; the store assigns id and `created_at`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    #[validate(length(max = 128))]
    pub user_id: Option<String>,
    #[validate(length(max = 256))]
    pub email: Option<String>,
    pub session_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub kind: Option<ActivityType>,
    #[validate(length(max = 2000))]
    pub page: Option<String>,
    #[validate(length(max = 2000))]
    pub path: Option<String>,
    #[validate(length(max = 2048))]
    pub referrer: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub device: Device,
    #[serde(default)]
    #[validate(nested)]
    pub location: Location,
    #[serde(default)]
    pub extra: MetaMap,
    pub occurred_at: Option<DateTime<Utc>>,
}

impl NewEvent {
    pub fn of_type(kind: ActivityType) -> Self {
        Self {
            kind: Some(kind),
            ..Self::default()
        }
    }

    /// Effective event type; `page_view` when the caller omitted it.
    pub fn kind_or_default(&self) -> ActivityType {
        self.kind.unwrap_or(ActivityType::PageView)
    }

    /// Effective event time; "now" when the caller omitted it.
    pub fn occurred_at_or_now(&self) -> DateTime<Utc> {
        self.occurred_at.unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_type_round_trips_snake_case() {
        let json = serde_json::to_string(&ActivityType::PageView).unwrap();
        assert_eq!(json, "\"page_view\"");
        let back: ActivityType = serde_json::from_str("\"session_end\"").unwrap();
        assert_eq!(back, ActivityType::SessionEnd);
    }

    #[test]
    fn opens_session_only_for_start_and_login() {
        assert!(ActivityType::SessionStart.opens_session());
        assert!(ActivityType::Login.opens_session());
        assert!(!ActivityType::PageView.opens_session());
        assert!(!ActivityType::SessionEnd.opens_session());
    }

    #[test]
    fn meta_value_accepts_loose_json() {
        let map: MetaMap =
            serde_json::from_str(r#"{"a": 1.5, "b": "x", "c": true, "d": null}"#).unwrap();
        assert_eq!(map["a"], MetaValue::Number(1.5));
        assert_eq!(map["b"], MetaValue::String("x".into()));
        assert_eq!(map["c"], MetaValue::Bool(true));
        assert_eq!(map["d"], MetaValue::Null);
    }

    #[test]
    fn new_event_defaults_to_page_view_now() {
        let ev = NewEvent::default();
        assert_eq!(ev.kind_or_default(), ActivityType::PageView);
        let dt = ev.occurred_at_or_now();
        assert!((Utc::now() - dt).num_seconds() < 5);
    }
}
