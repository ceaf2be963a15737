//! HTTP surface of the extraction service.
//!
//! `POST /scrape` with `{"urls": [...]}` answers with one extraction result
//! per URL. A body that is not valid JSON of that shape is a `400` with an
//! `{"error": "..."}` body. `GET /health` is a liveness check.

use crate::extract::ExtractionPool;
use crate::models::{ExtractionResult, ScrapeRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument, warn};

#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<ExtractionPool>,
    /// Cancelled on shutdown; every batch runs under a child of this token.
    pub shutdown: CancellationToken,
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/scrape", post(scrape_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[instrument(level = "info", skip_all)]
async fn scrape_handler(
    State(state): State<AppState>,
    payload: Result<Json<ScrapeRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected malformed scrape request");
            return (StatusCode::BAD_REQUEST, Json(json!({"error": rejection.body_text()}))).into_response();
        }
    };

    info!(count = request.urls.len(), "Scrape request received");
    let cancel = state.shutdown.child_token();
    let results: Vec<ExtractionResult> = state.pool.extract_with(request.urls, &cancel, |_, _| {}).await;
    Json(results).into_response()
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}
