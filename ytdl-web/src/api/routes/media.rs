//! Metadata queries: formats, info and search. Nothing is downloaded.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, RawQuery, State},
    routing::get,
};
use serde_json::{Value, json};
use tracing::warn;
use ytdl_options::{NativeOptions, catalog};

use crate::api::error::ApiResult;
use crate::api::models::{
    FormatSummary, FormatsResponse, InfoQuery, InfoType, SearchQuery, SearchResponse, SearchResult,
};
use crate::api::server::AppState;
use crate::engine::{EngineOptions, FormatInfo, MediaInfo};
use crate::error::Error;

/// Formats returned by `/formats`.
const MAX_LISTED_FORMATS: usize = 20;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/formats/{*url}", get(get_formats))
        .route("/info/{*url}", get(get_info))
        .route("/search/{query}", get(search))
}

/// Rebuild the target URL from the wildcard path and the raw query.
///
/// A URL pasted unencoded into the path loses its own query string to ours;
/// everything except our `reserved` parameters is handed back to it.
fn target_url(path: &str, raw_query: Option<&str>, reserved: &[&str]) -> String {
    let passthrough: Vec<&str> = raw_query
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let key = pair.split_once('=').map_or(*pair, |(k, _)| k);
            !reserved.contains(&key)
        })
        .collect();

    if passthrough.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, passthrough.join("&"))
    }
}

async fn resolve(state: &AppState, url: String, options: EngineOptions) -> ApiResult<MediaInfo> {
    let engine = Arc::clone(state.service.engine());
    let target = url.clone();
    let result = tokio::task::spawn_blocking(move || engine.resolve(&target, &options))
        .await
        .map_err(Error::from)?;
    result.map_err(|e| {
        warn!(url = %url, error = %e, "Metadata extraction failed");
        e.into()
    })
}

fn str_or<'a>(value: &'a Value, key: &str, default: &'a str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn opt_field(value: &Value, key: &str) -> Option<Value> {
    value.get(key).filter(|v| !v.is_null()).cloned()
}

fn format_summary(format: &FormatInfo) -> FormatSummary {
    FormatSummary {
        format_id: format.format_id.clone(),
        ext: if format.ext.is_empty() {
            "unknown".to_string()
        } else {
            format.ext.clone()
        },
        quality: format.quality(),
        filesize: format.filesize,
        vcodec: format.vcodec.clone().unwrap_or_else(|| "none".to_string()),
        acodec: format.acodec.clone().unwrap_or_else(|| "none".to_string()),
        fps: format.fps,
        tbr: format.tbr,
    }
}

pub fn formats_response(info: &MediaInfo) -> FormatsResponse {
    FormatsResponse {
        title: info.title.clone().unwrap_or_else(|| "Unknown".to_string()),
        duration: info.duration,
        formats: info
            .formats
            .iter()
            .take(MAX_LISTED_FORMATS)
            .map(|f| {
                let mut summary = format_summary(f);
                summary.fps = None;
                summary.tbr = None;
                summary
            })
            .collect(),
    }
}

pub fn info_response(info: &MediaInfo, info_type: InfoType) -> Value {
    let raw = &info.raw;
    match info_type {
        InfoType::Formats => json!({
            "formats": info.formats.iter().map(format_summary).collect::<Vec<_>>(),
        }),
        InfoType::Subtitles => {
            let subtitles = opt_field(raw, "subtitles").unwrap_or_else(|| json!({}));
            let automatic = opt_field(raw, "automatic_captions").unwrap_or_else(|| json!({}));
            let languages: BTreeSet<&str> = [&subtitles, &automatic]
                .into_iter()
                .filter_map(Value::as_object)
                .flat_map(|m| m.keys().map(String::as_str))
                .collect();
            json!({
                "subtitles": subtitles,
                "automatic_captions": automatic,
                "available_languages": languages,
            })
        }
        InfoType::Thumbnails => {
            let thumbnails: Vec<Value> = raw
                .get("thumbnails")
                .and_then(Value::as_array)
                .map(|list| {
                    list.iter()
                        .map(|t| {
                            json!({
                                "id": opt_field(t, "id"),
                                "url": opt_field(t, "url"),
                                "width": opt_field(t, "width"),
                                "height": opt_field(t, "height"),
                            })
                        })
                        .collect()
                })
                .unwrap_or_default();
            json!({ "thumbnails": thumbnails })
        }
        InfoType::Basic => json!({
            "title": info.title.as_deref().unwrap_or("Unknown"),
            "uploader": str_or(raw, "uploader", "Unknown"),
            "duration": info.duration,
            "description": str_or(raw, "description", ""),
            "view_count": opt_field(raw, "view_count"),
            "upload_date": opt_field(raw, "upload_date"),
            "webpage_url": opt_field(raw, "webpage_url"),
            "thumbnail": opt_field(raw, "thumbnail"),
            "tags": opt_field(raw, "tags").unwrap_or_else(|| json!([])),
            "categories": opt_field(raw, "categories").unwrap_or_else(|| json!([])),
        }),
    }
}

pub fn search_response(query: &str, info: &MediaInfo) -> SearchResponse {
    let results: Vec<SearchResult> = info
        .field("entries")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter(|e| e.is_object())
                .map(|entry| SearchResult {
                    title: str_or(entry, "title", "Unknown").to_string(),
                    url: str_or(entry, "url", "").to_string(),
                    id: str_or(entry, "id", "").to_string(),
                    duration: opt_field(entry, "duration"),
                    uploader: str_or(entry, "uploader", "Unknown").to_string(),
                    view_count: opt_field(entry, "view_count"),
                    description: str_or(entry, "description", "").to_string(),
                })
                .collect()
        })
        .unwrap_or_default();

    SearchResponse {
        query: query.to_string(),
        total: results.len(),
        results,
    }
}

/// Title, duration and the first formats of a URL.
async fn get_formats(
    State(state): State<AppState>,
    Path(url): Path<String>,
    RawQuery(raw_query): RawQuery,
) -> ApiResult<Json<FormatsResponse>> {
    let url = target_url(&url, raw_query.as_deref(), &[]);
    let info = resolve(&state, url, EngineOptions::default()).await?;
    Ok(Json(formats_response(&info)))
}

/// Info extraction without download.
async fn get_info(
    State(state): State<AppState>,
    Path(url): Path<String>,
    Query(query): Query<InfoQuery>,
    RawQuery(raw_query): RawQuery,
) -> ApiResult<Json<Value>> {
    let url = target_url(&url, raw_query.as_deref(), &["info_type"]);
    let info_type = query
        .info_type
        .as_deref()
        .and_then(|t| InfoType::from_str(t).ok())
        .unwrap_or_default();
    let info = resolve(&state, url, EngineOptions::default()).await?;
    Ok(Json(info_response(&info, info_type)))
}

/// Flat search through the engine's search extractors.
async fn search(
    State(state): State<AppState>,
    Path(query): Path<String>,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<SearchResponse>> {
    let search_query = format!("{}{}:{}", params.search_type, params.max_results, query);

    let mut native = NativeOptions::new();
    if let Some(spec) = catalog().get("flat_playlist") {
        native.insert(spec, Value::Bool(true));
    }

    let info = resolve(&state, search_query, EngineOptions::new(native)).await?;
    Ok(Json(search_response(&query, &info)))
}
