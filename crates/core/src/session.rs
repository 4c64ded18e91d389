//! Session handling types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::events::{Device, Location};

/// A user session: a mutable record with a closed lifecycle.
///
/// Invariant: `is_active == false` exactly when `ended_at` is set, and a
/// session transitions open -> closed at most once (idempotent close).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    /// External-identity id snapshot taken at session start
    pub user_id: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub location: Location,
    /// First page of the session
    pub path: Option<String>,
    pub referrer: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Closes the session. A second close is a no-op: `ended_at` keeps its
    /// first-set value.
    pub fn close(&mut self, at: DateTime<Utc>) {
        if self.ended_at.is_none() {
            self.ended_at = Some(at);
        }
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    /// Re-opens the session and refreshes its snapshot fields. `started_at`
    /// is insert-only and never touched here.
    pub fn reopen(&mut self, snapshot: &NewSession) {
        self.is_active = true;
        self.ended_at = None;
        self.user_id = snapshot.user_id.clone().or(self.user_id.take());
        self.email = snapshot.email.clone().or(self.email.take());
        if snapshot.device != Device::default() {
            self.device = snapshot.device.clone();
        }
        if snapshot.location != Location::default() {
            self.location = snapshot.location.clone();
        }
        if snapshot.path.is_some() {
            self.path = snapshot.path.clone();
        }
        if snapshot.referrer.is_some() {
            self.referrer = snapshot.referrer.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// Session fields supplied at start; the store assigns id and timestamps.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewSession {
    pub user_id: Option<String>,
    pub email: Option<String>,
    #[serde(default)]
    pub device: Device,
    #[serde(default)]
    pub location: Location,
    pub path: Option<String>,
    pub referrer: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}
