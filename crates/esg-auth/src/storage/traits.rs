//! Storage trait definitions.

use async_trait::async_trait;

use super::StorageResult;

/// Write-once store for uploaded blobs.
///
/// Implementations pick the stored name themselves and hand back a public
/// reference the caller can persist and later serve.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `data` uploaded as `filename` and return its public reference.
    async fn store(&self, data: &[u8], filename: &str) -> StorageResult<String>;

    /// Whether a previously returned reference still resolves to a blob.
    async fn exists(&self, reference: &str) -> StorageResult<bool>;
}
