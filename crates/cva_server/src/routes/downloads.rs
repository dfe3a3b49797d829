//! Published artifact listing and retrieval endpoints.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Deserialize;

use cva_pricing::PricingService;

use super::AppState;

/// Query string for a single artifact download
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// Run id the artifact was published under
    pub key: String,
}

/// Build the download routes
pub fn routes<S: PricingService>() -> Router<AppState<S>> {
    Router::new()
        .route("/api/v1/downloads", get(list_handler))
        .route("/api/v1/download/:store", get(download_handler))
}

/// GET /api/v1/downloads - Published artifact keys per store
async fn list_handler<S: PricingService>(State(state): State<AppState<S>>) -> impl IntoResponse {
    let mut listing = serde_json::Map::new();
    listing.insert(
        state.artifacts.csv.name().to_string(),
        serde_json::json!(state.artifacts.csv.keys()),
    );
    listing.insert(
        state.artifacts.table.name().to_string(),
        serde_json::json!(state.artifacts.table.keys()),
    );
    (StatusCode::OK, Json(serde_json::Value::Object(listing)))
}

/// GET /api/v1/download/{store}?key= - One artifact's bytes
///
/// The CSV store is served as `text/csv`, the tabular store as
/// `application/octet-stream`.
async fn download_handler<S: PricingService>(
    State(state): State<AppState<S>>,
    Path(store): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Response {
    let (artifact, content_type) = if store == state.artifacts.csv.name() {
        (state.artifacts.csv.get(&query.key), "text/csv")
    } else if store == state.artifacts.table.name() {
        (state.artifacts.table.get(&query.key), "application/octet-stream")
    } else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": format!("unknown artifact store: {store}") })),
        )
            .into_response();
    };

    match artifact {
        Some(bytes) => ([(header::CONTENT_TYPE, content_type)], bytes).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "error": format!("no artifact {} in {store}", query.key),
            })),
        )
            .into_response(),
    }
}
