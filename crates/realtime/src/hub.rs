//! Broadcast hub: one channel per logical topic.
//!
//! Delivery is best-effort, at-most-once per currently-connected subscriber.
//! There is no replay buffer; subscribers pull current state over REST on
//! (re)connect. Publishing never blocks and never fails the publisher: a
//! topic with no subscribers drops the payload, and a lagging subscriber
//! loses its own backlog without affecting anyone else.

use tokio::sync::broadcast;
use tracing::trace;

use crate::wire::{ActivityPayload, StatsUpdate};

/// Per-topic backlog before a slow subscriber starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Fan-out hub for the realtime topics.
pub struct Hub {
    activity_tx: broadcast::Sender<ActivityPayload>,
    stats_tx: broadcast::Sender<StatsUpdate>,
}

impl Hub {
    pub fn new() -> Self {
        let (activity_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (stats_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            activity_tx,
            stats_tx,
        }
    }

    /// Broadcasts `activity:new`. Fire-and-forget.
    pub fn publish_activity(&self, payload: ActivityPayload) {
        match self.activity_tx.send(payload) {
            Ok(delivered) => trace!(subscribers = delivered, "published activity"),
            Err(_) => trace!("no activity subscribers"),
        }
    }

    /// Broadcasts `stats:update`. Fire-and-forget.
    pub fn publish_stats(&self, update: StatsUpdate) {
        match self.stats_tx.send(update) {
            Ok(delivered) => trace!(subscribers = delivered, "published stats"),
            Err(_) => trace!("no stats subscribers"),
        }
    }

    pub fn subscribe_activity(&self) -> broadcast::Receiver<ActivityPayload> {
        self.activity_tx.subscribe()
    }

    pub fn subscribe_stats(&self) -> broadcast::Receiver<StatsUpdate> {
        self.stats_tx.subscribe()
    }

    /// Currently-connected subscriber count across both topics.
    pub fn subscriber_count(&self) -> usize {
        self.activity_tx.receiver_count() + self.stats_tx.receiver_count()
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new()
    }
}
