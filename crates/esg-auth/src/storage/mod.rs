//! Storage abstraction layer.
//!
//! Uploaded profile images go through the [`BlobStore`] trait. The only
//! backend is the local filesystem, served back under a public URL prefix.

mod error;
mod local;
mod traits;

use std::path::PathBuf;
use std::sync::Arc;

pub use error::{StorageError, StorageResult};
pub use local::{ALLOWED_IMAGE_EXTENSIONS, LocalImageStorage};
pub use traits::BlobStore;

/// Create storage based on configuration.
pub fn create_storage(config: StorageConfig) -> Arc<dyn BlobStore> {
    match config {
        StorageConfig::Local {
            base_path,
            public_prefix,
        } => Arc::new(LocalImageStorage::new(base_path, public_prefix)),
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    /// Local filesystem storage.
    Local {
        base_path: PathBuf,
        public_prefix: String,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Local {
            base_path: PathBuf::from("uploads/images"),
            public_prefix: "/images".to_string(),
        }
    }
}
