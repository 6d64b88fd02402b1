//! Download submission and job queries.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    routing::{get, post},
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::SubmitResponse;
use crate::api::server::AppState;
use crate::downloader::{Job, JobKind};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/download", post(submit_download))
        .route("/downloads", get(list_downloads))
        .route("/downloads/{id}", get(get_download))
}

/// Parsed multipart submission.
#[derive(Debug, Default)]
struct Submission {
    url: Option<String>,
    format_id: Option<String>,
    batch: Option<Vec<String>>,
    options: Map<String, Value>,
}

/// Non-empty trimmed lines of a batch file. The file must be UTF-8.
fn parse_batch_file(content: &[u8]) -> ApiResult<Vec<String>> {
    let text = std::str::from_utf8(content)
        .map_err(|e| ApiError::bad_request(format!("Batch file error: {}", e)))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

async fn read_submission(mut multipart: Multipart) -> ApiResult<Submission> {
    let mut submission = Submission::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid form data: {}", e)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        if name == "batchfile" {
            let content = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Batch file error: {}", e)))?;
            // An empty file input is sent when no file was chosen.
            if !content.is_empty() {
                submission.batch = Some(parse_batch_file(&content)?);
            }
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid form field {}: {}", name, e)))?;

        match name.as_str() {
            "url" => submission.url = non_empty(value),
            "format_id" => submission.format_id = non_empty(value),
            _ if value.is_empty() => {}
            _ => {
                submission.options.insert(name, Value::String(value));
            }
        }
    }

    Ok(submission)
}

/// Start a download (single URL or batch file) and return its identifier.
async fn submit_download(
    State(state): State<AppState>,
    multipart: Multipart,
) -> ApiResult<Json<SubmitResponse>> {
    let submission = read_submission(multipart).await?;
    let options = ytdl_options::translate(&submission.options, ytdl_options::catalog());
    debug!(
        received = submission.options.len(),
        accepted = options.len(),
        "Translated submission options"
    );
    let options_count = options.len();

    if let Some(urls) = submission.batch {
        if urls.is_empty() {
            return Err(ApiError::bad_request("Batch file contains no valid URLs"));
        }
        let (job, _) = state
            .service
            .submit_batch(urls, submission.format_id, options)?;
        return Ok(Json(SubmitResponse {
            download_id: job.id,
            kind: JobKind::Batch,
            url: None,
            batch_size: job.batch_size,
            options_count,
        }));
    }

    let Some(url) = submission.url else {
        return Err(ApiError::bad_request("URL is required"));
    };

    let (job, _) = state.service.submit(url, submission.format_id, options)?;
    Ok(Json(SubmitResponse {
        download_id: job.id,
        kind: JobKind::Single,
        url: Some(job.url),
        batch_size: None,
        options_count,
    }))
}

/// Snapshot of every known job.
async fn list_downloads(State(state): State<AppState>) -> Json<BTreeMap<String, Job>> {
    Json(state.service.list())
}

async fn get_download(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Job>> {
    Ok(Json(state.service.get(&id)?))
}
