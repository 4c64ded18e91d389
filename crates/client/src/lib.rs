//! Headless dashboard client.
//!
//! Consumes the realtime channel plus the REST read path. Pushed frames are
//! treated as cheap signals: activities are buffered and coalesced before the
//! visible feed mutates, and `stats:update` only marks the aggregates dirty
//! for a debounced REST re-pull. When the channel cannot connect or
//! authenticate the client keeps working over REST with last known
//! aggregates.

mod feed;
mod rest;

pub use rest::TimeseriesPage;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::Mutex;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::{
    connect_async, tungstenite::Message as WsMessage, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use analytics_core::{CoalescingTrigger, Error, Result};
use realtime_hub::{ActivityPayload, ServerMessage};
use stats_engine::{DeviceGroup, LocationGroup, Overview, TimeBucket};

/// How the client reaches the server.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// HTTP base, e.g. `http://127.0.0.1:3000`
    pub base_url: String,
    /// Bearer token for REST and the channel handshake
    pub token: String,
    /// Visible feed bound, newest first
    pub feed_capacity: usize,
    /// Coalescing window for incoming activities
    pub feed_coalesce: Duration,
    /// Debounce for dirty-stats REST re-pulls
    pub stats_debounce: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            feed_capacity: 100,
            feed_coalesce: Duration::from_millis(250),
            stats_debounce: Duration::from_millis(500),
        }
    }
}

/// Point-in-time copy of what a dashboard would render.
#[derive(Debug, Clone, Default)]
pub struct DashboardSnapshot {
    pub overview: Option<Overview>,
    pub timeseries: Vec<TimeBucket>,
    pub devices: Vec<DeviceGroup>,
    pub locations: Vec<LocationGroup>,
    /// Newest first, bounded to `feed_capacity`
    pub activities: Vec<ActivityPayload>,
}

#[derive(Default)]
struct ViewState {
    overview: Option<Overview>,
    timeseries: Vec<TimeBucket>,
    devices: Vec<DeviceGroup>,
    locations: Vec<LocationGroup>,
    feed: VecDeque<ActivityPayload>,
}

struct Shared {
    rest: rest::Rest,
    state: Mutex<ViewState>,
    pending: Mutex<Vec<ActivityPayload>>,
    stats_inflight: AtomicBool,
    channel_up: AtomicBool,
    feed_capacity: usize,
}

/// Headless consumer of the REST surface and the realtime channel.
pub struct DashboardClient {
    shared: Arc<Shared>,
    feed_trigger: Arc<CoalescingTrigger>,
    stats_trigger: Arc<CoalescingTrigger>,
    last_path: Mutex<Option<String>>,
    session_id: Mutex<Option<String>>,
    ws_task: Mutex<Option<JoinHandle<()>>>,
    ws_url: String,
}

impl DashboardClient {
    pub fn new(config: ClientConfig) -> Self {
        let shared = Arc::new(Shared {
            rest: rest::Rest::new(&config.base_url, &config.token),
            state: Mutex::new(ViewState::default()),
            pending: Mutex::new(Vec::new()),
            stats_inflight: AtomicBool::new(false),
            channel_up: AtomicBool::new(false),
            feed_capacity: config.feed_capacity,
        });

        let feed_shared = shared.clone();
        let feed_trigger = Arc::new(CoalescingTrigger::new(config.feed_coalesce, move || {
            let shared = feed_shared.clone();
            async move {
                let batch = std::mem::take(&mut *shared.pending.lock());
                let mut state = shared.state.lock();
                feed::apply_batch(&mut state.feed, batch, shared.feed_capacity);
            }
        }));

        let stats_shared = shared.clone();
        let stats_trigger = Arc::new(CoalescingTrigger::new(config.stats_debounce, move || {
            refresh_stats(stats_shared.clone())
        }));

        let ws_url = realtime_url(&config.base_url, &config.token);

        Self {
            shared,
            feed_trigger,
            stats_trigger,
            last_path: Mutex::new(None),
            session_id: Mutex::new(None),
            ws_task: Mutex::new(None),
            ws_url,
        }
    }

    /// Pulls the REST baseline, then attaches the realtime channel.
    ///
    /// A baseline failure is an error; a channel failure is not. Without the
    /// channel the client simply serves last known aggregates over REST.
    pub async fn connect(&self) -> Result<()> {
        let recent = self.shared.rest.recent(self.shared.feed_capacity).await?;
        self.shared.state.lock().feed = recent.into();
        pull_aggregates(&self.shared).await?;

        match connect_async(self.ws_url.as_str()).await {
            Ok((socket, _response)) => {
                self.shared.channel_up.store(true, Ordering::SeqCst);
                let task = tokio::spawn(read_loop(
                    socket,
                    self.shared.clone(),
                    self.feed_trigger.clone(),
                    self.stats_trigger.clone(),
                ));
                *self.ws_task.lock() = Some(task);
                info!("realtime channel attached");
            }
            Err(e) => {
                warn!(error = %e, "realtime channel unavailable, degrading to rest");
            }
        }

        Ok(())
    }

    /// Whether the realtime channel is currently attached.
    pub fn is_live(&self) -> bool {
        self.shared.channel_up.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        let state = self.shared.state.lock();
        DashboardSnapshot {
            overview: state.overview.clone(),
            timeseries: state.timeseries.clone(),
            devices: state.devices.clone(),
            locations: state.locations.clone(),
            activities: state.feed.iter().cloned().collect(),
        }
    }

    /// Opens a session; subsequent page views are linked to it.
    pub async fn start_session(&self) -> Result<String> {
        let body = json!({ "type": "session_start" });
        let response = self.shared.rest.track(&body).await?;
        let session_id = response
            .get("sessionId")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| Error::internal("track response missing sessionId"))?;
        *self.session_id.lock() = Some(session_id.clone());
        Ok(session_id)
    }

    /// Emits a `page_view`, at most once per distinct consecutive path.
    /// Returns whether a signal was actually sent.
    pub async fn track_page_view(&self, path: &str) -> Result<bool> {
        if !feed::is_new_path(&mut self.last_path.lock(), path) {
            return Ok(false);
        }
        let session_id = self.session_id.lock().clone();
        let body = json!({
            "type": "page_view",
            "path": path,
            "sessionId": session_id,
        });
        self.shared.rest.track(&body).await?;
        Ok(true)
    }

    /// Best-effort `session_end`; delivery failures are dropped.
    pub fn end_session(&self) {
        let Some(session_id) = self.session_id.lock().take() else {
            return;
        };
        let rest = self.shared.rest.clone();
        tokio::spawn(async move {
            let body = json!({ "type": "session_end", "sessionId": session_id });
            if let Err(e) = rest.track(&body).await {
                debug!(error = %e, "session_end delivery failed");
            }
        });
    }

    /// Detaches the realtime channel.
    pub fn disconnect(&self) {
        if let Some(task) = self.ws_task.lock().take() {
            task.abort();
        }
        self.shared.channel_up.store(false, Ordering::SeqCst);
    }
}

impl Drop for DashboardClient {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Full REST aggregate pull into the view state.
async fn pull_aggregates(shared: &Shared) -> Result<()> {
    let (overview, timeseries, devices, locations) = tokio::try_join!(
        shared.rest.overview(),
        shared.rest.timeseries(),
        shared.rest.devices(),
        shared.rest.locations(),
    )?;

    let mut state = shared.state.lock();
    state.overview = Some(overview);
    state.timeseries = timeseries.series;
    state.devices = devices;
    state.locations = locations;
    Ok(())
}

/// Debounced dirty-stats re-pull. A new pull is skipped while one is
/// running; failures keep the last known aggregates.
async fn refresh_stats(shared: Arc<Shared>) {
    if shared
        .stats_inflight
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        debug!("stats pull already in flight, skipping");
        return;
    }

    let result = pull_aggregates(&shared).await;
    shared.stats_inflight.store(false, Ordering::SeqCst);

    if let Err(e) = result {
        warn!(error = %e, "stats re-pull failed, keeping last known aggregates");
    }
}

async fn read_loop(
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
    shared: Arc<Shared>,
    feed_trigger: Arc<CoalescingTrigger>,
    stats_trigger: Arc<CoalescingTrigger>,
) {
    let (_write, mut read) = socket.split();

    while let Some(frame) = read.next().await {
        let text = match frame {
            Ok(WsMessage::Text(text)) => text,
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                warn!(error = %e, "realtime channel dropped");
                break;
            }
        };

        match serde_json::from_str::<ServerMessage>(&text) {
            Ok(ServerMessage::Connected { message }) => {
                debug!(%message, "realtime channel ready");
            }
            Ok(ServerMessage::ActivityNew(payload)) => {
                shared.pending.lock().push(payload);
                feed_trigger.fire();
            }
            Ok(ServerMessage::StatsUpdate(update)) => {
                debug!(
                    events = update.overview().events_count,
                    "aggregates marked dirty"
                );
                stats_trigger.fire();
            }
            Err(e) => {
                warn!(error = %e, "unrecognized realtime frame");
            }
        }
    }

    shared.channel_up.store(false, Ordering::SeqCst);
    info!("realtime channel closed, continuing over rest");
}

/// `http(s)://host` base to the `ws(s)://host/realtime?token=` endpoint.
fn realtime_url(base_url: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        format!("ws://{base}")
    };
    format!("{ws_base}/realtime?token={token}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn realtime_url_swaps_the_scheme() {
        assert_eq!(
            realtime_url("http://127.0.0.1:3000/", "t0k"),
            "ws://127.0.0.1:3000/realtime?token=t0k"
        );
        assert_eq!(
            realtime_url("https://dash.example.com", "t0k"),
            "wss://dash.example.com/realtime?token=t0k"
        );
    }

    #[tokio::test]
    async fn page_view_dedup_never_hits_the_network() {
        // the path must be marked before any request goes out, so a repeat
        // on a dead endpoint still short-circuits to Ok(false)
        let client = DashboardClient::new(ClientConfig::new("http://127.0.0.1:9", "t"));
        assert!(client.track_page_view("/home").await.is_err());
        // first call consumed the path even though the send failed
        assert_eq!(client.track_page_view("/home").await.unwrap(), false);
    }

    #[tokio::test]
    async fn end_session_without_a_session_is_a_no_op() {
        let client = DashboardClient::new(ClientConfig::new("http://127.0.0.1:9", "t"));
        client.end_session();
        assert!(client.session_id.lock().is_none());
    }
}
