//! HTTP router for the lab report service.
//!
//! Routes:
//! - `POST /extract` (multipart `file`) → `{data: {results: [...]}}`
//! - `POST /export/pdf` (JSON `{results: [...]}`) → `application/pdf`
//! - `GET /health`

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Build the API router. Request bodies above `ctx.max_upload_bytes` are
/// rejected with 413.
pub fn api_router(ctx: ApiContext) -> Router {
    let body_limit = ctx.max_upload_bytes;

    Router::new()
        .route("/extract", post(endpoints::extract::extract))
        .route("/export/pdf", post(endpoints::export::pdf))
        .route("/health", get(endpoints::health::check))
        .with_state(ctx)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
}
