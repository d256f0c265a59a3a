use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::metrics::Metrics;
use crate::scheduler::LatestSnapshot;

#[derive(Clone)]
pub struct AppState {
    pub latest: LatestSnapshot,
    /// Headlines per category; bounds the 1-based index route.
    pub headline_slots: usize,
}

/// Read-only query surface over the last built snapshot.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/news", get(news))
        .route("/news/{category}/{index}", get(news_item))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Same as [`router`] plus `/metrics`.
pub fn router_with_metrics(state: AppState, metrics: &Metrics) -> Router {
    router(state).merge(metrics.router())
}

fn error(status: StatusCode, msg: String) -> Response {
    (status, Json(json!({ "error": msg }))).into_response()
}

async fn news(State(state): State<AppState>) -> Response {
    match state.latest.get() {
        Some(snap) => Json(snap.payload()).into_response(),
        None => error(
            StatusCode::SERVICE_UNAVAILABLE,
            "No data available yet".to_string(),
        ),
    }
}

async fn news_item(
    State(state): State<AppState>,
    Path((category, index)): Path<(String, String)>,
) -> Response {
    // Parsed here so a bad index gets the same JSON error body as the rest.
    let index = match index.parse::<usize>() {
        Ok(i) if (1..=state.headline_slots).contains(&i) => i,
        _ => {
            return error(
                StatusCode::BAD_REQUEST,
                format!("Index out of range (must be 1-{})", state.headline_slots),
            )
        }
    };

    let Some(snap) = state.latest.get() else {
        return error(
            StatusCode::SERVICE_UNAVAILABLE,
            "No data available yet".to_string(),
        );
    };

    let Some(titles) = snap.headlines.get(&category) else {
        return error(
            StatusCode::NOT_FOUND,
            format!("Unknown category: {category}"),
        );
    };

    match titles.get(index - 1).filter(|t| !t.is_empty()) {
        Some(title) => Json(json!({
            "category": category,
            "index": index,
            "title": title,
        }))
        .into_response(),
        None => {
            let available = titles.iter().filter(|t| !t.is_empty()).count();
            error(
                StatusCode::NOT_FOUND,
                format!(
                    "No headline at index {index} for {category} (only {available} available)"
                ),
            )
        }
    }
}
