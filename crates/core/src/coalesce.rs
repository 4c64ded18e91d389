//! Single-slot coalescing trigger.
//!
//! Collapses bursts of signals into one deferred action: arm on the first
//! signal, wait out the window, drain whatever else arrived, run the action
//! once. Shared by the relay's stats-recompute trigger and the dashboard
//! client's refresh triggers.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A debounced, at-most-once-per-window action trigger.
///
/// `fire()` is cheap and non-blocking; the action runs on its own task. The
/// worker exits when the trigger is dropped.
pub struct CoalescingTrigger {
    tx: mpsc::Sender<()>,
    worker: JoinHandle<()>,
}

impl CoalescingTrigger {
    /// Spawns the trigger worker. `action` runs once per armed window, after
    /// the window elapses.
    pub fn new<F, Fut>(window: Duration, mut action: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send,
    {
        // Capacity 1: the slot is either armed or not; extra signals while
        // armed are the burst being collapsed.
        let (tx, mut rx) = mpsc::channel::<()>(1);
        let worker = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                tokio::time::sleep(window).await;
                while rx.try_recv().is_ok() {}
                action().await;
            }
        });
        Self { tx, worker }
    }

    /// Arms the trigger. Signals landing inside an already-armed window are
    /// absorbed into the pending firing.
    pub fn fire(&self) {
        let _ = self.tx.try_send(());
    }
}

impl Drop for CoalescingTrigger {
    fn drop(&mut self) {
        self.worker.abort();
    }
}
