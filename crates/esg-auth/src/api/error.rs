//! Unified API error handling with structured responses.

use axum::{
    Json,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

use crate::auth::AuthError;
use crate::member::MemberError;

/// API error type with structured responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidCredentials(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    InvalidInput {
        field: Option<&'static str>,
        message: String,
    },

    /// Detail is logged, never sent.
    #[error("failed to store file")]
    FileStorage(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("{0}")]
    UnsupportedMediaType(String),

    #[error("uploaded file exceeds the size limit")]
    PayloadTooLarge,

    /// Detail is logged, never sent.
    #[error("internal server error")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: None,
            message: message.into(),
        }
    }

    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidInput {
            field: Some(field),
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidInput { .. } => StatusCode::BAD_REQUEST,
            Self::FileStorage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "AUTH-001",
            Self::InvalidCredentials(_) => "AUTH-002",
            Self::Conflict(_) => "AUTH-003",
            Self::InvalidInput { .. } => "AUTH-004",
            Self::FileStorage(_) => "AUTH-005",
            Self::Unauthenticated => "AUTH-006",
            Self::UnsupportedMediaType(_) => "AUTH-007",
            Self::PayloadTooLarge => "AUTH-413",
            Self::Internal(_) => "AUTH-500",
        }
    }

    fn field(&self) -> Option<&'static str> {
        match self {
            Self::InvalidInput { field, .. } => *field,
            _ => None,
        }
    }
}

/// Structured error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();

        match &self {
            ApiError::Internal(detail) | ApiError::FileStorage(detail) => {
                error!(error_code = code, detail = %detail, "API error");
            }
            _ => {
                debug!(error_code = code, message = %message, "Client error");
            }
        }

        let body = ErrorResponse {
            error: message,
            code,
            field: self.field(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<MemberError> for ApiError {
    fn from(err: MemberError) -> Self {
        match err {
            MemberError::InvalidInput { field, message } => ApiError::InvalidInput {
                field: Some(field),
                message,
            },
            MemberError::DuplicateAccount(_) => ApiError::Conflict(err.to_string()),
            MemberError::AccountNotFound => ApiError::NotFound(err.to_string()),
            MemberError::InvalidCredentials(message) => ApiError::InvalidCredentials(message),
            MemberError::UnsupportedFileType(_) => ApiError::UnsupportedMediaType(err.to_string()),
            MemberError::FileStorage(detail) => ApiError::FileStorage(detail),
            MemberError::Store(e) => ApiError::Internal(e.to_string()),
            MemberError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Unauthenticated | AuthError::InvalidToken => ApiError::Unauthenticated,
            AuthError::Internal(detail) => ApiError::Internal(detail),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::bad_request(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(rejection: MultipartRejection) -> Self {
        ApiError::bad_request(format!("invalid multipart request: {}", rejection.body_text()))
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::PayloadTooLarge
        } else {
            ApiError::bad_request(format!("invalid multipart request: {}", err.body_text()))
        }
    }
}
