//! Request identity.
//!
//! Authentication itself lives upstream: the gateway validates the caller
//! and forwards the resolved numeric user id in a trusted header. This
//! extractor only reads that header; a missing or malformed value is a 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::NotifyError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated user, as resolved by the gateway.
#[derive(Debug, Clone, Copy)]
pub struct AuthedUser(pub i64);

impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = NotifyError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<i64>().ok())
            .map(AuthedUser)
            .ok_or(NotifyError::Unauthorized)
    }
}
