//! Health check routes.

use std::sync::Arc;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::api::error::ApiResult;
use crate::api::models::{EngineHealth, HealthResponse};
use crate::api::server::AppState;
use crate::error::Error;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness_check))
}

/// Health check endpoint.
///
/// `degraded` when the engine cannot be run; the server still accepts jobs,
/// they will simply fail.
async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let engine = Arc::clone(state.service.engine());
    let name = engine.name().to_string();
    // First call may spawn the engine to probe its version.
    let version = tokio::task::spawn_blocking(move || engine.version())
        .await
        .map_err(Error::from)?;
    let available = version.is_some();

    Ok(Json(HealthResponse {
        status: if available { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        engine: EngineHealth {
            name,
            available,
            version,
        },
        jobs: state.service.registry().len(),
        observers: state.hub.observer_count(),
    }))
}

/// Liveness check - is the service alive?
async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "uptime_secs": uptime
        })),
    )
}
