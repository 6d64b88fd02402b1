//! Download orchestration: job registry, duplicate detection, progress
//! adaptation and the single/batch executors.

mod duplicate;
mod hook;
mod job;
mod registry;
mod service;
mod slot;

pub use duplicate::{DuplicateCheck, DuplicateDetector};
pub use hook::ProgressHook;
pub use job::{BATCH_URL_LABEL, Job, JobKind, JobStatus, ProgressEvent};
pub use registry::JobRegistry;
pub use service::{DownloadService, GENERIC_OUTPUT_TEMPLATE};
pub use slot::ProgressSlot;
