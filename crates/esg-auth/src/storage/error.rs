//! Storage error types.

use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File extension outside the accepted image set.
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    /// Missing or unusable original filename.
    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage backend error.
    #[error("backend error: {0}")]
    Backend(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StorageError::UnsupportedFileType(".exe".to_string());
        assert_eq!(err.to_string(), "unsupported file type: .exe");

        let err = StorageError::InvalidFilename(String::new());
        assert_eq!(err.to_string(), "invalid filename: ");
    }
}
