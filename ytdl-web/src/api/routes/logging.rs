//! Runtime log filter.

use axum::{Json, Router, extract::State, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{LoggingFilterResponse, UpdateLoggingFilterRequest};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/filter", get(get_filter).put(update_filter))
}

async fn get_filter(State(state): State<AppState>) -> ApiResult<Json<LoggingFilterResponse>> {
    let config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Logging is not configured"))?;
    Ok(Json(LoggingFilterResponse {
        filter: config.get_filter(),
    }))
}

/// Replace the filter directive, e.g. `{"filter": "ytdl_web=debug"}`.
async fn update_filter(
    State(state): State<AppState>,
    Json(request): Json<UpdateLoggingFilterRequest>,
) -> ApiResult<Json<LoggingFilterResponse>> {
    let config = state
        .logging_config
        .as_ref()
        .ok_or_else(|| ApiError::service_unavailable("Logging is not configured"))?;

    config
        .set_filter(&request.filter)
        .map_err(|e| ApiError::bad_request(e.to_string()))?;

    Ok(Json(LoggingFilterResponse {
        filter: config.get_filter(),
    }))
}
