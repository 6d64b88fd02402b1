//! Single-slot, latest-wins progress channel.

use std::sync::Arc;

use parking_lot::Mutex;

use super::job::ProgressEvent;

/// Holds at most one undelivered progress event for a job.
///
/// The producer (the engine's progress hook) never blocks on consumers: a
/// deposit overwrites whatever has not been drained yet. The broadcast hub
/// drains with [`ProgressSlot::take`], so each event is delivered at most once.
#[derive(Debug, Clone, Default)]
pub struct ProgressSlot {
    inner: Arc<Mutex<Option<ProgressEvent>>>,
}

impl ProgressSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `event`, returning the unconsumed event it replaced.
    pub fn deposit(&self, event: ProgressEvent) -> Option<ProgressEvent> {
        self.inner.lock().replace(event)
    }

    /// Remove and return the pending event.
    pub fn take(&self) -> Option<ProgressEvent> {
        self.inner.lock().take()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_none()
    }
}
