//! Wire payloads for the realtime channel.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use analytics_core::{ActivityEvent, Device, Location};
use stats_engine::{Overview, Snapshot};

/// A published activity (`activity:new`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPayload {
    pub id: String,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    pub page: Option<String>,
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub location: Location,
    pub occurred_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<&ActivityEvent> for ActivityPayload {
    fn from(event: &ActivityEvent) -> Self {
        Self {
            id: event.id.to_string(),
            user_id: event.user_id.clone(),
            session_id: event.session_id.map(|id| id.to_string()),
            kind: event.kind.as_str().to_string(),
            page: event.page.clone().or_else(|| event.path.clone()),
            device: event.device.clone(),
            location: event.location.clone(),
            occurred_at: event.occurred_at,
            created_at: event.created_at,
        }
    }
}

/// A `stats:update` payload.
///
/// Older servers pushed the bare overview; current ones push the full
/// snapshot. Consumers must accept both, which is why this is an untagged
/// union, and why consumers should treat either as a dirty flag and re-pull
/// the REST read path rather than trusting the pushed shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatsUpdate {
    Comprehensive(Snapshot),
    Minimal(Overview),
}

impl StatsUpdate {
    /// The overview present in either shape.
    pub fn overview(&self) -> &Overview {
        match self {
            Self::Comprehensive(snapshot) => &snapshot.overview,
            Self::Minimal(overview) => overview,
        }
    }
}

/// Everything the server emits on the realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "connected")]
    Connected { message: String },
    #[serde(rename = "activity:new")]
    ActivityNew(ActivityPayload),
    #[serde(rename = "stats:update")]
    StatsUpdate(StatsUpdate),
}
