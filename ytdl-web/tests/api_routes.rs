//! HTTP surface, driven through the router without binding a socket.

mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use ytdl_web::api::{ApiServer, ApiServerConfig, AppState};

use common::{FakeEngine, Harness};

const BOUNDARY: &str = "ytdl-web-test-boundary";

fn router(harness: &Harness) -> Router {
    let state = AppState::new(harness.service.clone());
    ApiServer::new(ApiServerConfig::default(), state, CancellationToken::new()).build_router()
}

fn multipart(fields: &[(&str, &str)], batch: Option<&str>) -> Request<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some(content) = batch {
        body.push_str(&format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"batchfile\"; filename=\"urls.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n{content}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));

    Request::builder()
        .method("POST")
        .uri("/download")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn clip_harness() -> Harness {
    Harness::new(FakeEngine::with_info(json!({
        "title": "Clip",
        "ext": "mp4",
        "duration": 30,
        "uploader": "someone",
        "formats": [{"format_id": "22", "ext": "mp4", "height": 720, "vcodec": "avc1"}],
        "entries": [{"title": "Result", "url": "https://example/r", "id": "r"}],
    })))
}

mod download_routes {
    use super::*;

    #[tokio::test]
    async fn test_submit_without_url_is_rejected() {
        let harness = clip_harness();
        let response = router(&harness)
            .oneshot(multipart(&[("format_id", "22")], None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "URL is required");
        assert!(harness.service.list().is_empty());
    }

    #[tokio::test]
    async fn test_submit_single_url() {
        let harness = clip_harness();
        let response = router(&harness)
            .oneshot(multipart(
                &[
                    ("url", " https://example/video1 "),
                    ("extractaudio", "true"),
                    ("bogus", "1"),
                    ("proxy", ""),
                ],
                None,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["kind"], "single");
        assert_eq!(body["url"], "https://example/video1");
        assert_eq!(body["options_count"], 1);

        let id = body["download_id"].as_str().unwrap();
        assert!(harness.service.get(id).is_ok());
    }

    #[tokio::test]
    async fn test_submit_batch_file() {
        let harness = clip_harness();
        let response = router(&harness)
            .oneshot(multipart(
                &[("url", "https://example/ignored")],
                Some("https://example/a\n\n  https://example/b  \n"),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["kind"], "batch");
        assert_eq!(body["batch_size"], 2);
        assert!(body.get("url").is_none());
    }

    #[tokio::test]
    async fn test_blank_batch_file_is_rejected() {
        let harness = clip_harness();
        let response = router(&harness)
            .oneshot(multipart(&[], Some("\n   \n")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], "Batch file contains no valid URLs");
    }

    #[tokio::test]
    async fn test_non_utf8_batch_file_is_rejected() {
        let harness = clip_harness();
        let mut body = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"batchfile\"; filename=\"urls.txt\"\r\n\
             Content-Type: text/plain\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(b"https://example/a\n\xff\xfe\n");
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

        let request = Request::builder()
            .method("POST")
            .uri("/download")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();
        let response = router(&harness).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["message"].as_str().unwrap().starts_with("Batch file error"));
        assert!(harness.service.list().is_empty());
    }

    #[tokio::test]
    async fn test_job_queries() {
        let harness = clip_harness();
        let (job, handle) = harness
            .service
            .submit("https://example/video1", None, Default::default())
            .unwrap();
        handle.await.unwrap();

        let response = router(&harness).oneshot(get("/downloads")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body[&job.id]["status"], "completed");

        let response = router(&harness)
            .oneshot(get(&format!("/downloads/{}", job.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["url"], "https://example/video1");

        let response = router(&harness)
            .oneshot(get("/downloads/does-not-exist"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}

mod query_routes {
    use super::*;

    #[tokio::test]
    async fn test_formats() {
        let harness = clip_harness();
        let response = router(&harness)
            .oneshot(get("/formats/https://example/video1"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["title"], "Clip");
        assert_eq!(body["formats"][0]["quality"], "720p");
        assert_eq!(body["formats"][0]["vcodec"], "avc1");
        assert_eq!(body["formats"][0]["acodec"], "none");
    }

    #[tokio::test]
    async fn test_info_basic_and_search() {
        let harness = clip_harness();
        let response = router(&harness)
            .oneshot(get("/info/https://example/video1?info_type=basic"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["uploader"], "someone");

        let response = router(&harness)
            .oneshot(get("/search/cats?max_results=3"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["query"], "cats");
        assert_eq!(body["total"], 1);
        assert_eq!(body["results"][0]["title"], "Result");
    }

    #[tokio::test]
    async fn test_engine_failure_is_bad_gateway() {
        let harness = Harness::new(FakeEngine::unresolvable());
        let response = router(&harness)
            .oneshot(get("/formats/https://example/video1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn test_options_catalog() {
        let harness = clip_harness();
        let response = router(&harness).oneshot(get("/options")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["options"]["retries"]["type"], "number");
        assert!(body["categories"]["Download Options"].get("retries").is_some());
    }

    #[tokio::test]
    async fn test_health() {
        let harness = clip_harness();
        let response = router(&harness).oneshot(get("/health/live")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "alive");

        let response = router(&harness).oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["engine"]["name"], "fake");
    }

    #[tokio::test]
    async fn test_logging_filter_unconfigured() {
        let harness = clip_harness();
        let response = router(&harness)
            .oneshot(get("/api/logging/filter"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
