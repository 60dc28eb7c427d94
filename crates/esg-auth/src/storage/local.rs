//! Local filesystem image storage.

use async_trait::async_trait;
use log::{debug, info};
use std::path::{Path, PathBuf};
use tokio::fs;
use uuid::Uuid;

use super::{BlobStore, StorageError, StorageResult};

/// Extensions accepted for uploaded images (compared case-insensitively).
pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".gif"];

/// Stores uploaded images as `<uuid><ext>` under a base directory.
#[derive(Debug, Clone)]
pub struct LocalImageStorage {
    /// Base directory for storage.
    base_path: PathBuf,
    /// URL prefix the base directory is served under.
    public_prefix: String,
}

impl LocalImageStorage {
    /// Create a new local image storage instance.
    pub fn new(base_path: impl Into<PathBuf>, public_prefix: impl Into<String>) -> Self {
        let public_prefix = public_prefix.into();
        Self {
            base_path: base_path.into(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Ensure the base directory exists.
    async fn ensure_base_dir(&self) -> StorageResult<()> {
        if !fs::try_exists(&self.base_path).await? {
            fs::create_dir_all(&self.base_path).await?;
            debug!("Created upload directory {}", self.base_path.display());
        }
        Ok(())
    }

    /// Map a public reference back to a stored file name.
    fn stored_name<'a>(&self, reference: &'a str) -> Option<&'a str> {
        let name = reference
            .strip_prefix(self.public_prefix.as_str())?
            .strip_prefix('/')?;
        if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
            return None;
        }
        Some(name)
    }
}

/// Extract the lowercase extension (with its dot) of an accepted image name.
fn image_extension(filename: &str) -> StorageResult<String> {
    if filename.trim().is_empty() {
        return Err(StorageError::InvalidFilename(filename.to_string()));
    }

    let ext = filename
        .rfind('.')
        .map(|idx| filename[idx..].to_ascii_lowercase())
        .unwrap_or_default();

    if ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(StorageError::UnsupportedFileType(ext))
    }
}

#[async_trait]
impl BlobStore for LocalImageStorage {
    async fn store(&self, data: &[u8], filename: &str) -> StorageResult<String> {
        let ext = image_extension(filename)?;
        self.ensure_base_dir().await?;

        let saved_name = format!("{}{}", Uuid::new_v4(), ext);
        let destination = self.base_path.join(&saved_name);
        fs::write(&destination, data).await?;

        info!(
            "Stored upload {} as {} ({} bytes)",
            filename,
            destination.display(),
            data.len()
        );

        Ok(format!("{}/{}", self.public_prefix, saved_name))
    }

    async fn exists(&self, reference: &str) -> StorageResult<bool> {
        match self.stored_name(reference) {
            Some(name) => Ok(fs::try_exists(self.base_path.join(name)).await?),
            None => Ok(false),
        }
    }
}
