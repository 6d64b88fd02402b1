//! Job submission and the single/batch executors.

use std::path::{MAIN_SEPARATOR, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use ytdl_options::NativeOptions;

use super::duplicate::{DuplicateCheck, DuplicateDetector};
use super::hook::ProgressHook;
use super::job::{BATCH_URL_LABEL, Job, JobKind, JobStatus, ProgressEvent};
use super::registry::JobRegistry;
use crate::broadcast::BroadcastHub;
use crate::engine::{EngineOptions, ExtractionEngine};
use crate::utils::filename::escape_output_template;
use crate::{Error, Result};

/// Output template used when no filename could be predicted.
pub const GENERIC_OUTPUT_TEMPLATE: &str = "%(title)s [%(format_id)s].%(ext)s";

/// Owns the engine, the registry and the hub, and runs jobs.
pub struct DownloadService {
    engine: Arc<dyn ExtractionEngine>,
    registry: Arc<JobRegistry>,
    hub: Arc<BroadcastHub>,
    detector: DuplicateDetector,
}

impl DownloadService {
    pub fn new(
        engine: Arc<dyn ExtractionEngine>,
        registry: Arc<JobRegistry>,
        hub: Arc<BroadcastHub>,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            engine,
            registry,
            hub,
            detector: DuplicateDetector::new(download_dir),
        }
    }

    pub fn engine(&self) -> &Arc<dyn ExtractionEngine> {
        &self.engine
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn download_dir(&self) -> &std::path::Path {
        self.detector.download_dir()
    }

    pub fn list(&self) -> std::collections::BTreeMap<String, Job> {
        self.registry.snapshot()
    }

    pub fn get(&self, id: &str) -> Result<Job> {
        self.registry.get(id).ok_or_else(|| Error::not_found("Job", id))
    }

    /// Register a single-URL job and start it in the background.
    ///
    /// Returns the registered job and the executor's handle.
    pub fn submit(
        self: &Arc<Self>,
        url: impl Into<String>,
        format_id: Option<String>,
        options: NativeOptions,
    ) -> Result<(Job, JoinHandle<()>)> {
        let job = Job::single(url, format_id, options);
        self.registry.insert(job.clone())?;
        info!(
            download_id = %job.id,
            url = %job.url,
            options = job.options.len(),
            "Download submitted"
        );

        let service = Arc::clone(self);
        let task_job = job.clone();
        let handle = tokio::spawn(async move { service.run_single(task_job).await });
        Ok((job, handle))
    }

    /// Register a batch job over `urls` and start it in the background.
    pub fn submit_batch(
        self: &Arc<Self>,
        urls: Vec<String>,
        format_id: Option<String>,
        options: NativeOptions,
    ) -> Result<(Job, JoinHandle<()>)> {
        if urls.is_empty() {
            return Err(Error::validation("Batch file contains no valid URLs"));
        }
        let job = Job::batch(urls.len(), format_id, options);
        self.registry.insert(job.clone())?;
        info!(download_id = %job.id, urls = urls.len(), "Batch download submitted");

        let service = Arc::clone(self);
        let task_job = job.clone();
        let handle = tokio::spawn(async move { service.run_batch(task_job, urls).await });
        Ok((job, handle))
    }

    /// Base engine options for a job: format selector plus translated options.
    fn base_options(job: &Job) -> EngineOptions {
        EngineOptions::new(job.options.clone()).with_format(job.format_id.clone())
    }

    /// Absolute template for a predicted filename.
    fn exact_template(&self, filename: &str) -> String {
        escape_output_template(&self.detector.path_for(filename).to_string_lossy())
    }

    /// Absolute template resolved by the engine at download time.
    fn generic_template(&self) -> String {
        let dir = self.detector.download_dir().to_string_lossy();
        let dir = dir.trim_end_matches(['/', MAIN_SEPARATOR]);
        format!(
            "{}{}{}",
            escape_output_template(dir),
            MAIN_SEPARATOR,
            GENERIC_OUTPUT_TEMPLATE
        )
    }

    /// Run the engine's transfer on the blocking pool.
    async fn download_blocking(
        &self,
        job_id: &str,
        url: &str,
        options: EngineOptions,
    ) -> Result<()> {
        let slot = self
            .registry
            .slot(job_id)
            .ok_or_else(|| Error::not_found("Job", job_id))?;
        let hook = ProgressHook::new(job_id, slot);
        let engine = Arc::clone(&self.engine);
        let url = url.to_string();
        tokio::task::spawn_blocking(move || engine.download(&url, &options, &hook)).await?
    }

    /// Execute a single-URL job to a terminal status.
    pub async fn run_single(&self, job: Job) {
        if let Err(e) = self.try_run_single(&job).await {
            let message = e.to_string();
            error!(download_id = %job.id, error = %message, "Download failed");
            self.registry.fail(&job.id, &message, || {
                Job::orphan(&job.id, JobKind::Single, &job.url)
            });
            self.hub.publish(ProgressEvent::failed(&job.id, message)).await;
        }
    }

    async fn try_run_single(&self, job: &Job) -> Result<()> {
        let base = Self::base_options(job);

        let check = {
            let engine = Arc::clone(&self.engine);
            let detector = self.detector.clone();
            let url = job.url.clone();
            let options = base.clone();
            tokio::task::spawn_blocking(move || detector.check(engine.as_ref(), &url, &options))
                .await
                .unwrap_or_else(|e| DuplicateCheck::Unknown {
                    reason: Error::from(e).to_string(),
                })
        };

        let template = match check {
            DuplicateCheck::Duplicate { filename } => {
                self.registry.transition(&job.id, JobStatus::Skipped)?;
                info!(download_id = %job.id, filename = %filename, "Detected duplicate download");
                self.hub
                    .publish(ProgressEvent::already_downloaded(&job.id, filename))
                    .await;
                return Ok(());
            }
            DuplicateCheck::Fresh { filename } => {
                debug!(download_id = %job.id, filename = %filename, "Predicted output filename");
                self.exact_template(&filename)
            }
            DuplicateCheck::Unknown { reason } => {
                warn!(download_id = %job.id, error = %reason, "Could not check for existing files");
                self.generic_template()
            }
        };

        let options = base.with_output_template(template).with_no_overwrites();
        if !job.options.is_empty() {
            info!(
                download_id = %job.id,
                options = ?job.options.keys().collect::<Vec<_>>(),
                "Download using options"
            );
        }

        self.registry.transition(&job.id, JobStatus::Downloading)?;
        self.download_blocking(&job.id, &job.url, options).await?;
        self.registry.transition(&job.id, JobStatus::Completed)?;
        info!(download_id = %job.id, "Download completed");
        Ok(())
    }

    /// Execute a batch job: every URL is attempted, failures are reported
    /// and skipped.
    pub async fn run_batch(&self, job: Job, urls: Vec<String>) {
        if let Err(e) = self.try_run_batch(&job, &urls).await {
            let message = e.to_string();
            error!(download_id = %job.id, error = %message, "Batch download failed");
            self.registry.fail(&job.id, &message, || {
                Job::orphan(&job.id, JobKind::Batch, BATCH_URL_LABEL)
            });
            self.hub.publish(ProgressEvent::failed(&job.id, message)).await;
        }
    }

    async fn try_run_batch(&self, job: &Job, urls: &[String]) -> Result<()> {
        let options = Self::base_options(job)
            .with_output_template(self.generic_template())
            .with_no_overwrites();
        let total = urls.len();
        let mut completed = 0;

        self.registry.transition(&job.id, JobStatus::Downloading)?;

        for (index, url) in urls.iter().enumerate() {
            let position = index + 1;
            self.hub
                .publish(ProgressEvent::batch_step(&job.id, position, total, completed, url))
                .await;

            match self.download_blocking(&job.id, url, options.clone()).await {
                Ok(()) => {
                    completed += 1;
                    info!(download_id = %job.id, url = %url, "Batch download: completed URL");
                }
                Err(e) => {
                    let message = e.to_string();
                    error!(
                        download_id = %job.id,
                        url = %url,
                        error = %message,
                        "Batch download: URL failed"
                    );
                    let event = ProgressEvent::batch_url_failed(&job.id, position, total, &message);
                    self.hub.publish(event).await;
                }
            }
        }

        self.registry.transition(&job.id, JobStatus::Completed)?;
        info!(download_id = %job.id, completed, total, "Batch download finished");
        self.hub
            .publish(ProgressEvent::batch_finished(&job.id, completed, total))
            .await;
        Ok(())
    }

    /// Periodically drop finished jobs older than `retention`.
    pub fn start_retention_purge(
        self: &Arc<Self>,
        retention: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let period = retention.clamp(Duration::from_secs(1), Duration::from_secs(60));
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Job retention task shutting down");
                        break;
                    }
                    _ = interval.tick() => {
                        let removed = registry.purge_finished(retention);
                        if removed > 0 {
                            info!(removed, remaining = registry.len(), "Purged finished jobs");
                        }
                    }
                }
            }
        })
    }
}
