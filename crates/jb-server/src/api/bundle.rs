//! Bundle creation endpoint.
//!
//! Endpoints:
//!   POST /api/bundle  : `{ files: [{ url, filename }], zipFilename? }` → ZIP download
//!   POST /            : same handler, for clients posting to the service root
//!
//! Any other method answers 405; OPTIONS answers an empty 200 for preflights.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Response,
    routing::post,
    Router,
};
use bytes::Bytes;

use crate::bundle::response::bundle_response;
use crate::AppState;
use jb_common::{AppError, AppResult};

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(create_bundle).options(preflight))
        .route("/api/bundle", post(create_bundle).options(preflight))
        .with_state(state)
}

async fn create_bundle(State(state): State<Arc<AppState>>, body: Bytes) -> AppResult<Response> {
    let order = state.validator.validate(&body).inspect_err(|e| {
        tracing::debug!(error = %e, "Rejected bundle request");
    })?;

    let bundle = state
        .bundles
        .get_or_build(&order.files)
        .await
        .map_err(|e| AppError::Internal(anyhow::Error::new(e)))?;

    let filename = order
        .zip_filename
        .as_deref()
        .unwrap_or(&state.config.bundle.default_filename);

    Ok(bundle_response(&bundle, filename))
}

async fn preflight() -> StatusCode {
    StatusCode::OK
}
