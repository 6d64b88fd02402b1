//! Job records and progress events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ytdl_options::NativeOptions;

use crate::utils::filename::truncate_chars;

/// URL label recorded for batch jobs.
pub const BATCH_URL_LABEL: &str = "batch";

/// Lifecycle status of a job.
///
/// ```text
/// pending -> downloading -> completed
///    |            \-------> error
///    |-> skipped
///    \-> error
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Downloading,
    Skipped,
    Completed,
    Error,
}

impl JobStatus {
    /// Terminal states are never left.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Skipped | Self::Completed | Self::Error)
    }

    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Downloading | Skipped | Error) | (Downloading, Completed | Error)
        )
    }
}

/// Single URL or batch file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum JobKind {
    Single,
    Batch,
}

/// A tracked download request.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    /// Source URL, or [`BATCH_URL_LABEL`] for batch jobs.
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_id: Option<String>,
    pub options: NativeOptions,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    fn new(
        id: String,
        kind: JobKind,
        url: String,
        format_id: Option<String>,
        options: NativeOptions,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            url,
            format_id,
            options,
            status: JobStatus::Pending,
            error: None,
            batch_size: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// A single-URL job with a fresh identifier.
    pub fn single(
        url: impl Into<String>,
        format_id: Option<String>,
        options: NativeOptions,
    ) -> Self {
        Self::new(new_job_id(), JobKind::Single, url.into(), format_id, options)
    }

    /// A batch job with a fresh identifier.
    pub fn batch(batch_size: usize, format_id: Option<String>, options: NativeOptions) -> Self {
        let mut job = Self::new(
            new_job_id(),
            JobKind::Batch,
            BATCH_URL_LABEL.to_string(),
            format_id,
            options,
        );
        job.batch_size = Some(batch_size);
        job
    }

    /// Placeholder record for a job that failed before it was registered.
    pub(crate) fn orphan(id: &str, kind: JobKind, url: &str) -> Self {
        Self::new(id.to_string(), kind, url.to_string(), None, NativeOptions::default())
    }
}

fn new_job_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Point-in-time snapshot pushed to observers.
///
/// Serialized flat; absent fields are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub download_id: String,
    /// `downloading`, `completed`, `warning`, `error` or an engine label.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_progress: Option<String>,
}

impl ProgressEvent {
    pub fn new(download_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            download_id: download_id.into(),
            status: status.into(),
            percentage: None,
            speed: None,
            eta: None,
            filename: None,
            message: None,
            error: None,
            batch_progress: None,
        }
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The file already exists; reported as a completed transfer.
    pub fn already_downloaded(download_id: &str, filename: impl Into<String>) -> Self {
        Self::new(download_id, "completed")
            .with_message("Already downloaded")
            .with_filename(filename)
    }

    pub fn failed(download_id: &str, error: impl Into<String>) -> Self {
        let mut event = Self::new(download_id, "error");
        event.error = Some(error.into());
        event
    }

    pub fn warning(download_id: &str, message: impl Into<String>) -> Self {
        Self::new(download_id, "warning").with_message(message)
    }

    /// Announces the next URL of a batch.
    pub fn batch_step(
        download_id: &str,
        position: usize,
        total: usize,
        completed: usize,
        url: &str,
    ) -> Self {
        let mut event = Self::new(download_id, "downloading").with_message(format!(
            "Processing URL {position}/{total}: {}...",
            truncate_chars(url, 50)
        ));
        event.batch_progress = Some(format!("{completed}/{total}"));
        event
    }

    pub fn batch_url_failed(download_id: &str, position: usize, total: usize, error: &str) -> Self {
        Self::warning(
            download_id,
            format!("Failed URL {position}/{total}: {}", truncate_chars(error, 100)),
        )
    }

    pub fn batch_finished(download_id: &str, completed: usize, total: usize) -> Self {
        Self::new(download_id, "completed")
            .with_message(format!("Batch completed: {completed}/{total} successful"))
    }
}
