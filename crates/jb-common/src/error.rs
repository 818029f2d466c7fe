use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Convenient Result alias.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
///
/// Rendered as a plain-text body; clients of the bundle endpoint read the
/// reason directly.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_bad_request_is_plain_text() {
        let response = AppError::BadRequest("files must be a non-empty array".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"files must be a non-empty array");
    }

    #[tokio::test]
    async fn test_internal_keeps_message() {
        let response = AppError::from(anyhow::anyhow!("origin unreachable")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"Internal error: origin unreachable");
    }
}
