//! Authentication error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Failures that leave the authenticator and go through the standard
/// error-to-response mapping.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("access denied")]
    AccessDenied,
    #[error("session expired")]
    SessionExpired,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AuthError {
    /// Whether the error passes through unchanged. Everything else is
    /// narrowed to [`AuthError::AccessDenied`].
    pub fn propagates(&self) -> bool {
        matches!(self, AuthError::AccessDenied | AuthError::SessionExpired)
    }
}

/// Why token authentication refused a request. Rendered directly as the
/// response; the handler never runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenRejection {
    Missing,
    Expired,
    Invalid,
}

impl TokenRejection {
    // The misspelling is part of the wire format clients match on.
    pub fn message(&self) -> &'static str {
        match self {
            TokenRejection::Missing => "Token missing, Aacess denied",
            TokenRejection::Expired => "Expired token, access denied",
            TokenRejection::Invalid => "Invalid token, access denied",
        }
    }
}

impl IntoResponse for TokenRejection {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            error: &'static str,
        }

        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: self.message(),
            }),
        )
            .into_response()
    }
}
