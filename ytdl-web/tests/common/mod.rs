//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use tempfile::TempDir;
use ytdl_web::Result;
use ytdl_web::broadcast::{BroadcastHub, ProgressObserver};
use ytdl_web::downloader::{DownloadService, JobRegistry, ProgressEvent};
use ytdl_web::engine::{EngineOptions, EngineProgress, ExtractionEngine, MediaInfo, ProgressSink};
use ytdl_web::error::Error;

/// Engine double: metadata comes from a fixed document, downloads only
/// report progress.
#[derive(Default)]
pub struct FakeEngine {
    /// `None` makes every resolve fail.
    info: Option<Value>,
    panic_on_resolve: bool,
    failing_urls: Vec<String>,
    pub downloads: Mutex<Vec<(String, EngineOptions)>>,
}

impl FakeEngine {
    pub fn with_info(info: Value) -> Self {
        Self {
            info: Some(info),
            ..Self::default()
        }
    }

    pub fn unresolvable() -> Self {
        Self::default()
    }

    /// Metadata extraction crashes the worker instead of returning an error.
    pub fn panicking_resolve() -> Self {
        Self {
            panic_on_resolve: true,
            ..Self::default()
        }
    }

    pub fn failing_on(mut self, url: &str) -> Self {
        self.failing_urls.push(url.to_string());
        self
    }

    pub fn download_count(&self) -> usize {
        self.downloads.lock().len()
    }
}

impl ExtractionEngine for FakeEngine {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn resolve(&self, url: &str, _options: &EngineOptions) -> Result<MediaInfo> {
        if self.panic_on_resolve {
            panic!("extractor crashed on {url}");
        }
        match &self.info {
            Some(info) => MediaInfo::from_json(info.clone()),
            None => Err(Error::engine(format!("ERROR: Unsupported URL: {url}"))),
        }
    }

    fn download(
        &self,
        url: &str,
        options: &EngineOptions,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        self.downloads.lock().push((url.to_string(), options.clone()));
        if self.failing_urls.iter().any(|u| u == url) {
            return Err(Error::engine(format!("ERROR: unable to download {url}")));
        }

        let filename = format!("{}.mp4", url.rsplit('/').next().unwrap_or("media"));
        progress.on_progress(EngineProgress(json!({
            "status": "downloading",
            "_percent_str": " 50.0%",
            "_speed_str": "1.00MiB/s",
            "_eta_str": "00:01",
            "filename": filename,
        })));
        progress.on_progress(EngineProgress(json!({
            "status": "finished",
            "filename": filename,
        })));
        Ok(())
    }

    fn version(&self) -> Option<String> {
        Some("2024.01.01".to_string())
    }
}

/// Observer that keeps every event it is sent.
#[derive(Default)]
pub struct Recorder {
    received: Mutex<Vec<ProgressEvent>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl ProgressObserver for Recorder {
    async fn send(&self, payload: &str) -> Result<()> {
        self.received.lock().push(serde_json::from_str(payload)?);
        Ok(())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub engine: Arc<FakeEngine>,
    pub hub: Arc<BroadcastHub>,
    pub service: Arc<DownloadService>,
}

impl Harness {
    pub fn new(engine: FakeEngine) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let engine = Arc::new(engine);
        let registry = Arc::new(JobRegistry::new());
        let hub = Arc::new(BroadcastHub::new(
            Arc::clone(&registry),
            Duration::from_millis(20),
        ));
        let service = Arc::new(DownloadService::new(
            engine.clone(),
            registry,
            Arc::clone(&hub),
            dir.path(),
        ));
        Self {
            dir,
            engine,
            hub,
            service,
        }
    }

    pub fn recorder(&self) -> Arc<Recorder> {
        let recorder = Arc::new(Recorder::default());
        self.hub.connect(recorder.clone());
        recorder
    }
}
