//! Option catalog listing.

use std::collections::BTreeMap;

use axum::{Json, Router, routing::get};
use serde::Serialize;
use ytdl_options::{OptionCategory, OptionSpec, catalog};

use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/options", get(list_options))
}

#[derive(Debug, Serialize)]
pub struct OptionsResponse {
    /// Options grouped by category label.
    pub categories: BTreeMap<OptionCategory, BTreeMap<&'static str, &'static OptionSpec>>,
    pub options: BTreeMap<&'static str, &'static OptionSpec>,
}

pub fn options_response() -> OptionsResponse {
    let catalog = catalog();
    let categories = catalog
        .by_category()
        .into_iter()
        .map(|(category, specs)| (category, specs.into_iter().map(|s| (s.key, s)).collect()))
        .collect();
    let options = catalog.iter().map(|s| (s.key, s)).collect();
    OptionsResponse { categories, options }
}

async fn list_options() -> Json<OptionsResponse> {
    Json(options_response())
}
