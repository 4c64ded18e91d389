//! Change-feed types: notifications, resume tokens, and the feed handle.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Opaque cursor identifying a position in a change feed.
///
/// Process-local: created on first subscription, updated on every observed
/// change, lost on restart (a tokenless subscription simply watches forward
/// from "now").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResumeToken(u64);

impl ResumeToken {
    pub(crate) fn new(seq: u64) -> Self {
        Self(seq)
    }

    pub(crate) fn seq(&self) -> u64 {
        self.0
    }
}

/// Operation kind observed on a watched collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One change-feed notification, delivered in commit order.
#[derive(Debug, Clone)]
pub struct Change<T> {
    /// Cursor for resuming after this change
    pub token: ResumeToken,
    pub op: ChangeOp,
    /// Full document after the change
    pub doc: T,
}

/// A live subscription on one collection.
///
/// Ends (yields `None`) when the store drops the subscription; the consumer
/// is expected to resubscribe with its last token. Dropping the feed closes
/// the subscription.
#[derive(Debug)]
pub struct ChangeFeed<T> {
    rx: mpsc::UnboundedReceiver<Change<T>>,
}

impl<T> ChangeFeed<T> {
    pub(crate) fn new(rx: mpsc::UnboundedReceiver<Change<T>>) -> Self {
        Self { rx }
    }

    /// Next notification, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Change<T>> {
        self.rx.recv().await
    }
}
