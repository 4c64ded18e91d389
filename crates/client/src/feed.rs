//! Visible-feed bookkeeping.

use std::collections::VecDeque;

use realtime_hub::ActivityPayload;

/// Folds a coalesced batch into the visible feed. The batch arrives in
/// publish order (oldest first); the feed stays newest first and bounded.
pub(crate) fn apply_batch(
    feed: &mut VecDeque<ActivityPayload>,
    batch: Vec<ActivityPayload>,
    capacity: usize,
) {
    for activity in batch {
        feed.push_front(activity);
    }
    feed.truncate(capacity);
}

/// At most one page view per distinct consecutive path.
pub(crate) fn is_new_path(last: &mut Option<String>, path: &str) -> bool {
    if last.as_deref() == Some(path) {
        false
    } else {
        *last = Some(path.to_string());
        true
    }
}
