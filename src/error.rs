use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The caller has no organizational anchor (HOD without department, dean without school)
    #[error("Scope not found: {0}")]
    ScopeNotFound(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),
    /// Error produced once by a cache loader and shared with every waiter
    #[error(transparent)]
    Cached(Arc<Error>),
    #[error("Fatal error: {0}")]
    Fatal(#[from] anyhow::Error),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::ScopeNotFound(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Unauthorized => StatusCode::UNAUTHORIZED,
            Error::Cached(inner) => inner.status(),
            Error::Store(_) | Error::Decode(_) | Error::Csv(_) | Error::Fatal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            // internal details stay in the log
            error!("request failed: {}", self);
            return (status, "Internal server error").into_response();
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        assert_eq!(
            Error::ScopeNotFound("hod has no department".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::Forbidden("course".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            Error::Validation("regNo".into()).status(),
            StatusCode::BAD_REQUEST
        );
        let shared = Error::Cached(Arc::new(Error::NotFound("course c1".into())));
        assert_eq!(shared.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            Error::Fatal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn server_errors_hide_details() {
        let response = Error::Fatal(anyhow::anyhow!("secret table missing")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"Internal server error");
    }
}
