//! End-to-end job execution against a fake engine.

mod common;

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use ytdl_options::NativeOptions;
use ytdl_web::broadcast::ChannelObserver;
use ytdl_web::downloader::{BATCH_URL_LABEL, GENERIC_OUTPUT_TEMPLATE, Job, JobKind, JobStatus};

use common::{FakeEngine, Harness};

fn clip_info() -> serde_json::Value {
    json!({
        "title": "Clip",
        "ext": "mp4",
        "duration": 12.5,
        "formats": [
            {"format_id": "18", "ext": "mp4", "height": 360},
            {"format_id": "22", "ext": "mp4", "height": 720},
        ],
    })
}

mod single_tests {
    use super::*;

    #[tokio::test]
    async fn test_existing_file_is_skipped() {
        let harness = Harness::new(FakeEngine::with_info(clip_info()));
        std::fs::write(harness.dir.path().join("Clip [720p].mp4"), b"done").unwrap();
        let recorder = harness.recorder();

        let (job, handle) = harness
            .service
            .submit("https://example/video1", Some("22".into()), NativeOptions::new())
            .unwrap();
        handle.await.unwrap();

        assert_eq!(harness.engine.download_count(), 0);
        assert_eq!(harness.service.get(&job.id).unwrap().status, JobStatus::Skipped);

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, "completed");
        assert_eq!(events[0].message.as_deref(), Some("Already downloaded"));
        assert_eq!(events[0].filename.as_deref(), Some("Clip [720p].mp4"));
    }

    #[tokio::test]
    async fn test_other_quality_is_not_a_duplicate() {
        let harness = Harness::new(FakeEngine::with_info(clip_info()));
        std::fs::write(harness.dir.path().join("Clip [360p].mp4"), b"done").unwrap();

        let (job, handle) = harness
            .service
            .submit("https://example/video1", Some("22".into()), NativeOptions::new())
            .unwrap();
        handle.await.unwrap();

        assert_eq!(harness.service.get(&job.id).unwrap().status, JobStatus::Completed);
        let downloads = harness.engine.downloads.lock();
        assert_eq!(downloads.len(), 1);
        let options = &downloads[0].1;
        assert_eq!(options.format.as_deref(), Some("22"));
        assert!(options.no_overwrites);
        assert!(
            options
                .output_template
                .as_deref()
                .unwrap()
                .ends_with("Clip [720p].mp4")
        );
    }

    #[tokio::test]
    async fn test_completed_progress_reaches_observer_on_tick() {
        let harness = Harness::new(FakeEngine::with_info(clip_info()));
        let recorder = harness.recorder();

        let (job, handle) = harness
            .service
            .submit("https://example/video1", None, NativeOptions::new())
            .unwrap();
        handle.await.unwrap();

        // Progress is coalesced in the slot until the next tick.
        assert!(recorder.events().is_empty());
        assert_eq!(harness.hub.tick_once().await, 1);

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].download_id, job.id);
        assert_eq!(events[0].status, "completed");
        assert_eq!(events[0].filename.as_deref(), Some("video1.mp4"));

        // Nothing left to send.
        assert_eq!(harness.hub.tick_once().await, 0);
    }

    #[tokio::test]
    async fn test_resolve_failure_uses_generic_template() {
        let harness = Harness::new(FakeEngine::unresolvable());

        let (job, handle) = harness
            .service
            .submit("https://example/video1", None, NativeOptions::new())
            .unwrap();
        handle.await.unwrap();

        assert_eq!(harness.service.get(&job.id).unwrap().status, JobStatus::Completed);
        let downloads = harness.engine.downloads.lock();
        let template = downloads[0].1.output_template.clone().unwrap();
        assert!(template.ends_with(GENERIC_OUTPUT_TEMPLATE));
    }

    #[tokio::test]
    async fn test_crashed_metadata_check_still_downloads() {
        let harness = Harness::new(FakeEngine::panicking_resolve());
        let recorder = harness.recorder();

        let (job, handle) = harness
            .service
            .submit("https://example/video1", None, NativeOptions::new())
            .unwrap();
        handle.await.unwrap();

        let stored = harness.service.get(&job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert!(stored.error.is_none());

        let downloads = harness.engine.downloads.lock();
        assert_eq!(downloads.len(), 1);
        let template = downloads[0].1.output_template.clone().unwrap();
        assert!(template.ends_with(GENERIC_OUTPUT_TEMPLATE));
        drop(downloads);

        harness.hub.tick_once().await;
        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, "completed");
    }

    #[tokio::test]
    async fn test_download_failure_marks_job_errored() {
        let harness = Harness::new(
            FakeEngine::with_info(clip_info()).failing_on("https://example/broken"),
        );
        let recorder = harness.recorder();

        let (job, handle) = harness
            .service
            .submit("https://example/broken", None, NativeOptions::new())
            .unwrap();
        handle.await.unwrap();

        let stored = harness.service.get(&job.id).unwrap();
        assert_eq!(stored.status, JobStatus::Error);
        assert_eq!(
            stored.error.as_deref(),
            Some("ERROR: unable to download https://example/broken")
        );

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, "error");
        assert!(events[0].error.as_deref().unwrap().contains("unable to download"));
    }

    #[tokio::test]
    async fn test_options_reach_engine() {
        let harness = Harness::new(FakeEngine::with_info(clip_info()));
        let mut raw = serde_json::Map::new();
        raw.insert("extractaudio".into(), json!("on"));
        raw.insert("retries".into(), json!("x"));
        let options = ytdl_options::translate(&raw, ytdl_options::catalog());

        let (job, handle) = harness
            .service
            .submit("https://example/video1", None, options)
            .unwrap();
        assert_eq!(job.options.len(), 1);
        handle.await.unwrap();

        let downloads = harness.engine.downloads.lock();
        assert_eq!(downloads[0].1.native.get("extractaudio"), Some(&json!(true)));
        assert!(!downloads[0].1.native.contains("retries"));
    }
}

mod batch_tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let harness = Harness::new(
            FakeEngine::with_info(clip_info()).failing_on("https://example/bad"),
        );
        let recorder = harness.recorder();
        let urls = vec![
            "https://example/a".to_string(),
            "https://example/bad".to_string(),
            "https://example/c".to_string(),
        ];

        let (job, handle) = harness
            .service
            .submit_batch(urls, None, NativeOptions::new())
            .unwrap();
        assert_eq!(job.batch_size, Some(3));
        handle.await.unwrap();

        assert_eq!(harness.engine.download_count(), 3);
        assert_eq!(harness.service.get(&job.id).unwrap().status, JobStatus::Completed);

        let events = recorder.events();
        let warnings: Vec<_> = events.iter().filter(|e| e.status == "warning").collect();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].message.as_deref().unwrap().starts_with("Failed URL 2/3:"));

        let steps: Vec<_> = events
            .iter()
            .filter_map(|e| e.batch_progress.as_deref())
            .collect();
        assert_eq!(steps, vec!["0/3", "1/3", "1/3"]);

        let last = events.last().unwrap();
        assert_eq!(last.status, "completed");
        assert_eq!(last.message.as_deref(), Some("Batch completed: 2/3 successful"));
    }

    #[tokio::test]
    async fn test_batch_never_checks_duplicates() {
        let harness = Harness::new(FakeEngine::with_info(clip_info()));
        std::fs::write(harness.dir.path().join("Clip [default].mp4"), b"done").unwrap();

        let (_, handle) = harness
            .service
            .submit_batch(vec!["https://example/a".into()], None, NativeOptions::new())
            .unwrap();
        handle.await.unwrap();

        assert_eq!(harness.engine.download_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_rejected() {
        let harness = Harness::new(FakeEngine::with_info(clip_info()));
        assert!(
            harness
                .service
                .submit_batch(Vec::new(), None, NativeOptions::new())
                .is_err()
        );
        assert!(harness.service.list().is_empty());
    }
}

mod observer_tests {
    use super::*;

    #[tokio::test]
    async fn test_dead_observer_removed_others_still_served() {
        let harness = Harness::new(FakeEngine::with_info(clip_info()));
        let recorder = harness.recorder();

        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        harness.hub.connect(Arc::new(ChannelObserver::new(tx)));
        assert_eq!(harness.hub.observer_count(), 2);

        let (_, handle) = harness
            .service
            .submit("https://example/video1", None, NativeOptions::new())
            .unwrap();
        handle.await.unwrap();
        harness.hub.tick_once().await;

        assert_eq!(harness.hub.observer_count(), 1);
        assert_eq!(recorder.events().len(), 1);
    }

    #[tokio::test]
    async fn test_every_job_reaches_terminal_status() {
        let harness = Harness::new(
            FakeEngine::with_info(clip_info()).failing_on("https://example/bad"),
        );
        // Only the default-quality prediction exists on disk.
        std::fs::write(harness.dir.path().join("Clip [default].mp4"), b"done").unwrap();

        let submissions = [
            ("https://example/skipped", None),
            ("https://example/bad", Some("22".to_string())),
            ("https://example/fresh", Some("18".to_string())),
        ];
        let mut handles = Vec::new();
        for (url, format_id) in submissions {
            let (_, handle) = harness
                .service
                .submit(url, format_id, NativeOptions::new())
                .unwrap();
            handles.push(handle);
        }
        let (_, handle) = harness
            .service
            .submit_batch(vec!["https://example/bad".into()], None, NativeOptions::new())
            .unwrap();
        handles.push(handle);

        for handle in handles {
            handle.await.unwrap();
        }

        let jobs = harness.service.list();
        assert_eq!(jobs.len(), 4);
        assert!(jobs.values().all(|job| job.status.is_terminal()));

        let status_of = |url: &str| {
            jobs.values()
                .find(|job| job.url == url)
                .map(|job| job.status)
                .unwrap()
        };
        assert_eq!(status_of("https://example/skipped"), JobStatus::Skipped);
        assert_eq!(status_of("https://example/bad"), JobStatus::Error);
        assert_eq!(status_of("https://example/fresh"), JobStatus::Completed);
        assert_eq!(status_of(BATCH_URL_LABEL), JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_batch_setup_failure_records_error() {
        let harness = Harness::new(FakeEngine::with_info(clip_info()));
        let recorder = harness.recorder();

        // Never registered, so the executor cannot move it to downloading.
        let job = Job::batch(2, None, NativeOptions::new());
        harness
            .service
            .run_batch(
                job.clone(),
                vec!["https://example/a".into(), "https://example/b".into()],
            )
            .await;

        assert_eq!(harness.engine.download_count(), 0);

        let stored = harness.service.get(&job.id).unwrap();
        assert_eq!(stored.url, BATCH_URL_LABEL);
        assert_eq!(stored.kind, JobKind::Batch);
        assert_eq!(stored.status, JobStatus::Error);
        assert!(!stored.error.as_deref().unwrap_or_default().is_empty());

        let events = recorder.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].status, "error");
        assert_eq!(events[0].download_id, job.id);
    }
}
