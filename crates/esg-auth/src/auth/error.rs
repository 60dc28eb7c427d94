//! Authentication errors.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Authentication errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    /// No bound identity on a route that requires one.
    #[error("authentication required")]
    Unauthenticated,

    /// Token failed validation. The cause is deliberately not carried.
    #[error("invalid token")]
    InvalidToken,

    /// Internal error (signing, hashing).
    #[error("internal auth error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable error code sent to clients.
    pub fn error_code(&self) -> &'static str {
        match self {
            // A bad token is reported exactly like a missing one.
            AuthError::Unauthenticated | AuthError::InvalidToken => "AUTH-006",
            AuthError::Internal(_) => "AUTH-500",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated | AuthError::InvalidToken => StatusCode::UNAUTHORIZED,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct AuthErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AuthError::Internal(msg) => {
                tracing::error!(error = %msg, "internal authentication error");
                "internal server error".to_string()
            }
            _ => AuthError::Unauthenticated.to_string(),
        };

        let body = Json(AuthErrorResponse {
            error: message,
            code: self.error_code(),
        });

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        assert_eq!(
            AuthError::Unauthenticated.to_string(),
            "authentication required"
        );
        assert_eq!(AuthError::InvalidToken.to_string(), "invalid token");
    }

    #[test]
    fn test_token_failure_is_indistinguishable_from_missing_identity() {
        assert_eq!(
            AuthError::InvalidToken.error_code(),
            AuthError::Unauthenticated.error_code()
        );
        assert_eq!(
            AuthError::InvalidToken.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_internal_error_status() {
        let response = AuthError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
