//! API routes module.

mod bundle;
mod health;

use crate::AppState;
use axum::extract::DefaultBodyLimit;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Build the full router. Every response, errors included, carries
/// permissive CORS headers.
pub fn router(state: Arc<AppState>) -> Router {
    let max_body = state.config.server.max_body_bytes;

    Router::new()
        .merge(bundle::router(state))
        .merge(health::router())
        .layer(DefaultBodyLimit::max(max_body))
        .layer(CorsLayer::permissive())
}
