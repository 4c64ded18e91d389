//! Change-feed relay.
//!
//! Maintains two logical subscriptions (activity-event inserts and session
//! changes), each resilient to transient disconnects. Every notification's
//! change-identifier is captured as the new resume token before any further
//! processing, so a resubscribe after a failure carries on from the last
//! observed position. A rejected (too old) token falls back to a tokenless
//! subscription from "now" rather than failing permanently.
//!
//! Event inserts fan out an `activity:new` payload and arm a debounced stats
//! recompute; session changes arm the recompute only. The recompute always
//! re-reads current store state; notifications are triggers, never inputs.
//! That keeps the two unordered subscriptions from drifting the aggregates.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use analytics_core::{CoalescingTrigger, Error, Result};
use event_store::{Change, ChangeOp, EventStore, ResumeToken};
use realtime_hub::{ActivityPayload, Hub, StatsUpdate};
use stats_engine::StatsEngine;

/// Relay tuning.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Pause before reopening a failed or ended subscription. Fixed, short,
    /// and never zero: resubscribing in a tight loop against a down store
    /// is the failure mode this guards.
    pub reopen_delay: Duration,
    /// Window for collapsing recompute triggers.
    pub stats_debounce: Duration,
    /// Lookback handed to the published snapshot.
    pub window_minutes: i64,
    /// Bucket width handed to the published snapshot.
    pub interval_minutes: i64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            reopen_delay: Duration::from_millis(250),
            stats_debounce: Duration::from_millis(200),
            window_minutes: 60,
            interval_minutes: 5,
        }
    }
}

/// Lifecycle of one subscription, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedState {
    Opening,
    Open,
    Reopening,
}

/// The relay. `start` is retryable; `shutdown` closes both subscriptions.
pub struct ChangeFeedRelay {
    store: Arc<dyn EventStore>,
    hub: Arc<Hub>,
    stats: StatsEngine,
    config: RelayConfig,
    running: Mutex<Option<Running>>,
}

struct Running {
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
    // Keeps the recompute worker alive for the relay's lifetime
    _stats_trigger: Arc<CoalescingTrigger>,
}

impl ChangeFeedRelay {
    pub fn new(
        store: Arc<dyn EventStore>,
        hub: Arc<Hub>,
        stats: StatsEngine,
        config: RelayConfig,
    ) -> Self {
        Self {
            store,
            hub,
            stats,
            config,
            running: Mutex::new(None),
        }
    }

    /// Starts both subscription loops.
    ///
    /// Fails fast with `NotConnected` when the store is not reachable yet;
    /// the caller may retry later. Starting an already-started relay is a
    /// no-op.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }
        if !self.store.is_connected() {
            return Err(Error::not_connected("relay start refused"));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats_trigger = Arc::new(Self::spawn_stats_trigger(
            self.stats.clone(),
            self.hub.clone(),
            &self.config,
        ));

        let handles = vec![
            self.spawn_event_loop(shutdown_rx.clone(), stats_trigger.clone()),
            self.spawn_session_loop(shutdown_rx, stats_trigger.clone()),
        ];

        *running = Some(Running {
            shutdown_tx,
            handles,
            _stats_trigger: stats_trigger,
        });
        info!("change-feed relay started");
        Ok(())
    }

    /// Signals both loops and waits for them to close their subscriptions.
    pub async fn shutdown(&self) {
        let running = self.running.lock().take();
        let Some(running) = running else {
            return;
        };
        let _ = running.shutdown_tx.send(true);
        for handle in running.handles {
            let _ = handle.await;
        }
        info!("change-feed relay stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// The debounced recompute shared by both loops. Failures are logged and
    /// skipped; they never touch subscription health.
    fn spawn_stats_trigger(
        stats: StatsEngine,
        hub: Arc<Hub>,
        config: &RelayConfig,
    ) -> CoalescingTrigger {
        let window = config.window_minutes;
        let interval = config.interval_minutes;
        CoalescingTrigger::new(config.stats_debounce, move || {
            let stats = stats.clone();
            let hub = hub.clone();
            async move {
                match stats.snapshot(Some(window), Some(interval)).await {
                    Ok(snapshot) => hub.publish_stats(StatsUpdate::Comprehensive(snapshot)),
                    Err(e) => warn!(error = %e, "stats recompute failed, skipping"),
                }
            }
        })
    }

    fn spawn_event_loop(
        &self,
        mut shutdown: watch::Receiver<bool>,
        stats_trigger: Arc<CoalescingTrigger>,
    ) -> JoinHandle<()> {
        let store = self.store.clone();
        let hub = self.hub.clone();
        let reopen_delay = self.config.reopen_delay;

        tokio::spawn(async move {
            // Relay-owned resume slot: written only by this handler
            let mut resume: Option<ResumeToken> = None;
            let mut state = FeedState::Opening;

            loop {
                if state == FeedState::Reopening {
                    if wait_or_shutdown(&mut shutdown, reopen_delay).await {
                        break;
                    }
                }

                let mut feed = match store.watch_events(resume).await {
                    Ok(feed) => feed,
                    Err(Error::TokenInvalidated(msg)) => {
                        // Accepted data gap: restart from "now"
                        warn!(%msg, "events resume token invalidated, watching from now");
                        resume = None;
                        state = FeedState::Reopening;
                        continue;
                    }
                    Err(e) => {
                        // Transient interruptions reopen quietly; anything
                        // else is worth an operator's attention
                        if e.is_transient() {
                            debug!(error = %e, "events watch interrupted, reopening");
                        } else {
                            warn!(error = %e, "events watch failed");
                        }
                        state = FeedState::Reopening;
                        continue;
                    }
                };
                state = FeedState::Open;
                debug!("events subscription open");

                loop {
                    tokio::select! {
                        change = feed.next() => match change {
                            Some(change) => {
                                // Token first, then processing: a downstream
                                // failure must not rewind the cursor
                                resume = Some(change.token);
                                handle_event_change(&hub, &stats_trigger, change);
                            }
                            None => {
                                debug!("events subscription ended");
                                state = FeedState::Reopening;
                                break;
                            }
                        },
                        changed = shutdown.changed() => {
                            // A dropped sender means the relay is gone
                            if changed.is_err() || *shutdown.borrow() {
                                debug!("events subscription closing");
                                return;
                            }
                        }
                    }
                }
            }
        })
    }

    fn spawn_session_loop(
        &self,
        mut shutdown: watch::Receiver<bool>,
        stats_trigger: Arc<CoalescingTrigger>,
    ) -> JoinHandle<()> {
        let store = self.store.clone();
        let reopen_delay = self.config.reopen_delay;

        tokio::spawn(async move {
            let mut resume: Option<ResumeToken> = None;
            let mut state = FeedState::Opening;

            loop {
                if state == FeedState::Reopening {
                    if wait_or_shutdown(&mut shutdown, reopen_delay).await {
                        break;
                    }
                }

                let mut feed = match store.watch_sessions(resume).await {
                    Ok(feed) => feed,
                    Err(Error::TokenInvalidated(msg)) => {
                        warn!(%msg, "sessions resume token invalidated, watching from now");
                        resume = None;
                        state = FeedState::Reopening;
                        continue;
                    }
                    Err(e) => {
                        if e.is_transient() {
                            debug!(error = %e, "sessions watch interrupted, reopening");
                        } else {
                            warn!(error = %e, "sessions watch failed");
                        }
                        state = FeedState::Reopening;
                        continue;
                    }
                };
                state = FeedState::Open;
                debug!("sessions subscription open");

                loop {
                    tokio::select! {
                        change = feed.next() => match change {
                            Some(change) => {
                                resume = Some(change.token);
                                // Any session operation can move the active
                                // count; recompute, no discrete payload
                                stats_trigger.fire();
                            }
                            None => {
                                debug!("sessions subscription ended");
                                state = FeedState::Reopening;
                                break;
                            }
                        },
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                debug!("sessions subscription closing");
                                return;
                            }
                        }
                    }
                }
            }
        })
    }
}

fn handle_event_change(
    hub: &Hub,
    stats_trigger: &CoalescingTrigger,
    change: Change<analytics_core::ActivityEvent>,
) {
    if change.op == ChangeOp::Insert {
        hub.publish_activity(ActivityPayload::from(&change.doc));
    }
    stats_trigger.fire();
}

/// Sleeps out the reopen delay; returns true when shutdown fired (or the
/// relay was dropped) instead.
async fn wait_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        changed = shutdown.changed() => changed.is_err() || *shutdown.borrow(),
    }
}
