//! REST read/write path.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use analytics_core::{Error, Result};
use realtime_hub::ActivityPayload;
use stats_engine::{DeviceGroup, LocationGroup, Overview, TimeBucket};

/// `GET /api/stats/timeseries` page.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeseriesPage {
    pub series: Vec<TimeBucket>,
    pub interval_minutes: i64,
    pub total_minutes: i64,
}

#[derive(Debug, Deserialize)]
struct DevicesPage {
    devices: Vec<DeviceGroup>,
}

#[derive(Debug, Deserialize)]
struct LocationsPage {
    locations: Vec<LocationGroup>,
}

#[derive(Debug, Deserialize)]
struct RecentPage {
    activities: Vec<ActivityPayload>,
}

/// Thin authenticated wrapper over the dashboard REST surface.
#[derive(Clone)]
pub(crate) struct Rest {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl Rest {
    pub(crate) fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::internal(format!("GET {path} failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::internal(format!(
                "GET {path} returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::internal(format!("GET {path} returned invalid body: {e}")))
    }

    pub(crate) async fn overview(&self) -> Result<Overview> {
        self.get_json("/api/stats/overview").await
    }

    pub(crate) async fn timeseries(&self) -> Result<TimeseriesPage> {
        self.get_json("/api/stats/timeseries").await
    }

    pub(crate) async fn devices(&self) -> Result<Vec<DeviceGroup>> {
        let page: DevicesPage = self.get_json("/api/stats/devices").await?;
        Ok(page.devices)
    }

    pub(crate) async fn locations(&self) -> Result<Vec<LocationGroup>> {
        let page: LocationsPage = self.get_json("/api/stats/locations").await?;
        Ok(page.locations)
    }

    pub(crate) async fn recent(&self, limit: usize) -> Result<Vec<ActivityPayload>> {
        let page: RecentPage = self
            .get_json(&format!("/api/activities/recent?limit={limit}"))
            .await?;
        Ok(page.activities)
    }

    /// `POST /api/activities/track`; returns the raw `{id, sessionId}` body.
    pub(crate) async fn track(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/api/activities/track", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::internal(format!("track failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::internal(format!(
                "track returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::internal(format!("track returned invalid body: {e}")))
    }
}
