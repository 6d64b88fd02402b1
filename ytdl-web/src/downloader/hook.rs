//! Engine progress to progress-event adapter.

use super::job::ProgressEvent;
use super::slot::ProgressSlot;
use crate::engine::{EngineProgress, ProgressSink};

/// Normalizes engine progress for one job and deposits it in the job's slot.
///
/// Called synchronously from inside the blocking transfer; it only swaps the
/// slot contents and never fails.
#[derive(Debug, Clone)]
pub struct ProgressHook {
    job_id: String,
    slot: ProgressSlot,
}

impl ProgressHook {
    pub fn new(job_id: impl Into<String>, slot: ProgressSlot) -> Self {
        Self {
            job_id: job_id.into(),
            slot,
        }
    }

    /// Map an engine record onto the event shape observers understand.
    pub fn normalize(&self, progress: &EngineProgress) -> ProgressEvent {
        match progress.status() {
            "downloading" => {
                let mut event = ProgressEvent::new(&self.job_id, "downloading")
                    .with_filename(progress.filename().unwrap_or("Unknown"));
                event.percentage = Some(progress.percent().unwrap_or_else(|| "0%".to_string()));
                event.speed = Some(progress.speed().unwrap_or_else(|| "N/A".to_string()));
                event.eta = Some(progress.eta().unwrap_or_else(|| "N/A".to_string()));
                event
            }
            // Transfer finished; post-processing may still follow.
            "finished" => ProgressEvent::new(&self.job_id, "completed")
                .with_filename(progress.filename().unwrap_or("Unknown")),
            other => ProgressEvent::new(&self.job_id, other).with_message(progress.0.to_string()),
        }
    }
}

impl ProgressSink for ProgressHook {
    fn on_progress(&self, progress: EngineProgress) {
        self.slot.deposit(self.normalize(&progress));
    }
}
