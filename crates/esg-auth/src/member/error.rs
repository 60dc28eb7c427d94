//! Member service errors.

use thiserror::Error;

use crate::auth::{AuthError, MemberId};
use crate::storage::StorageError;

/// Errors raised by the member store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The email is already taken (UNIQUE constraint).
    #[error("email already registered")]
    DuplicateEmail,

    /// Update targeted a member that does not exist.
    #[error("member {0} not found")]
    NotFound(MemberId),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Classify a sqlx error, surfacing UNIQUE violations as duplicates.
    pub fn from_write(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::DuplicateEmail,
            _ => StoreError::Database(err),
        }
    }
}

/// Member operation errors.
#[derive(Debug, Error)]
pub enum MemberError {
    /// A request field failed validation.
    #[error("{message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    /// An account with this email already exists.
    #[error("member already exists with email: {0}")]
    DuplicateAccount(String),

    /// No account for the given email or id.
    #[error("member not found")]
    AccountNotFound,

    /// Presented password does not match.
    #[error("{0}")]
    InvalidCredentials(String),

    /// Uploaded file is not an accepted image type.
    #[error("unsupported image type '{0}'. Supported types: .jpg, .jpeg, .png, .gif")]
    UnsupportedFileType(String),

    /// Writing the uploaded file failed.
    #[error("failed to store file: {0}")]
    FileStorage(String),

    /// Store failure.
    #[error(transparent)]
    Store(StoreError),

    /// Hashing or signing failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MemberError {
    pub fn invalid_input(field: &'static str, message: impl Into<String>) -> Self {
        MemberError::InvalidInput {
            field,
            message: message.into(),
        }
    }

    /// Offending field for validation errors.
    pub fn field(&self) -> Option<&'static str> {
        match self {
            MemberError::InvalidInput { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<StoreError> for MemberError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => MemberError::AccountNotFound,
            other => MemberError::Store(other),
        }
    }
}

impl From<AuthError> for MemberError {
    fn from(err: AuthError) -> Self {
        MemberError::Internal(err.to_string())
    }
}

impl From<StorageError> for MemberError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedFileType(ext) => MemberError::UnsupportedFileType(ext),
            StorageError::InvalidFilename(_) => {
                MemberError::invalid_input("file", "uploaded file has no usable filename")
            }
            StorageError::Io(e) => MemberError::FileStorage(e.to_string()),
            StorageError::Backend(msg) => MemberError::FileStorage(msg),
        }
    }
}
