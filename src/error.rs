//! Error types for notifyd.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("notification not found: {0}")]
    NotFound(i64),

    #[error("notification {0} does not belong to the requesting user")]
    NotOwner(i64),

    #[error("invalid notification type for this endpoint: {0}")]
    InvalidType(String),

    #[error("missing or invalid user identity")]
    Unauthorized,
}

impl IntoResponse for NotifyError {
    fn into_response(self) -> Response {
        let status = match &self {
            NotifyError::NotFound(_) => StatusCode::NOT_FOUND,
            NotifyError::NotOwner(_) => StatusCode::BAD_REQUEST,
            NotifyError::InvalidType(_) => StatusCode::BAD_REQUEST,
            NotifyError::Unauthorized => StatusCode::UNAUTHORIZED,
            NotifyError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Store failures carry driver detail — log it, return a generic body.
        let body = match &self {
            NotifyError::Db(e) => {
                error!("database error: {e}");
                "internal error".to_string()
            }
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}
