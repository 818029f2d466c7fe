//! Download response for an assembled bundle.

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use super::CachedBundle;

/// Bundles are content-addressed, so a response never goes stale.
pub const IMMUTABLE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

/// Build the 200 response carrying the archive. Hits and misses look the same.
pub fn bundle_response(bundle: &CachedBundle, filename: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
            (header::ETAG, bundle.etag.clone()),
            (header::CACHE_CONTROL, IMMUTABLE_CACHE_CONTROL.to_string()),
            (
                header::LAST_MODIFIED,
                bundle
                    .created_at
                    .format("%a, %d %b %Y %H:%M:%S GMT")
                    .to_string(),
            ),
        ],
        Body::from(bundle.bytes.clone()),
    )
        .into_response()
}
