//! API route modules.

pub mod downloads;
pub mod health;
pub mod logging;
pub mod media;
pub mod options;
pub mod ws;

use axum::Router;

use crate::api::server::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(downloads::router())
        .merge(media::router())
        .merge(options::router())
        .merge(ws::router())
        .nest("/api/logging", logging::router())
        .nest("/health", health::router())
        .with_state(state)
}
