//! Object storage contract.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};

/// Bucket + key object store.
///
/// A store is bound to one bucket. Selecting a different bucket is an
/// explicit call to [`ObjectStore::for_bucket`], which returns a handle
/// sharing the same underlying connection.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Currently selected bucket (empty when none was selected).
    fn bucket(&self) -> &str;

    /// Handle bound to `bucket`.
    fn for_bucket(&self, bucket: &str) -> Arc<dyn ObjectStore>;

    /// Upload a local file, returning the object's URL.
    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<String>;

    /// Upload an in-memory buffer, returning the object's URL.
    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<String>;

    /// Download an object into memory.
    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Download an object to `path`, creating parent directories.
    async fn download_file(&self, key: &str, path: &Path) -> StorageResult<PathBuf> {
        let bytes = self.download_bytes(key).await?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                StorageError::download_failed(format!("Failed to create directory: {}", e))
            })?;
        }

        tokio::fs::write(path, bytes)
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to write file: {}", e)))?;

        debug!(bucket = %self.bucket(), key = %key, path = %path.display(), "Downloaded object");
        Ok(path.to_path_buf())
    }
}

/// Guard used by implementations before touching a bucket.
pub(crate) fn require_bucket(bucket: &str, operation: &'static str) -> StorageResult<()> {
    if bucket.is_empty() {
        Err(StorageError::NoBucketSelected(operation))
    } else {
        Ok(())
    }
}
