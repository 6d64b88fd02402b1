//! Request and response bodies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::downloader::JobKind;

/// Returned immediately by `POST /download`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub download_id: String,
    pub kind: JobKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    /// Number of options that survived translation.
    pub options_count: usize,
}

/// One row of the format listing.
#[derive(Debug, Clone, Serialize)]
pub struct FormatSummary {
    pub format_id: String,
    pub ext: String,
    pub quality: String,
    pub filesize: Option<u64>,
    pub vcodec: String,
    pub acodec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tbr: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatsResponse {
    pub title: String,
    pub duration: Option<f64>,
    pub formats: Vec<FormatSummary>,
}

/// Kind of information requested from `/info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum InfoType {
    #[default]
    Basic,
    Formats,
    Subtitles,
    Thumbnails,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InfoQuery {
    #[serde(default)]
    pub info_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchQuery {
    #[serde(default = "default_search_type")]
    pub search_type: String,
    #[serde(default = "default_max_results")]
    pub max_results: u32,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            search_type: default_search_type(),
            max_results: default_max_results(),
        }
    }
}

fn default_search_type() -> String {
    "ytsearch".to_string()
}

fn default_max_results() -> u32 {
    10
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub id: String,
    pub duration: Option<Value>,
    pub uploader: String,
    pub view_count: Option<Value>,
    pub description: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub results: Vec<SearchResult>,
    pub total: usize,
}

/// Response for the logging filter endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct LoggingFilterResponse {
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateLoggingFilterRequest {
    pub filter: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineHealth {
    pub name: String,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub engine: EngineHealth,
    pub jobs: usize,
    pub observers: usize,
}
