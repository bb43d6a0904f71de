//! Grant-protocol and token-lifecycle errors.

use {crate::http::interceptors::ApiError, chrono::{DateTime, Utc}, thiserror::Error};

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("grant rejected by authorization server: {0}")]
    GrantRejected(ApiError),
    #[error("malformed grant response: {0}")]
    MalformedGrantResponse(String),
    #[error("unexpected state transition: {0}")]
    UnexpectedTransition(String),
    #[error("interaction finish hash mismatch")]
    FinishHashMismatch,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("access token can no longer be rotated (management endpoint returned 401)")]
    Unrotatable,
    #[error("access token management endpoint returned 404")]
    NotFound,
    #[error("access token expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },
}
