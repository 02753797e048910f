//! In-memory object store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};
use crate::store::{require_bucket, ObjectStore};

type Objects = HashMap<(String, String), (Vec<u8>, String)>;

/// Object store backed by a shared map. Handles returned by `for_bucket`
/// see the same objects.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    bucket: String,
    objects: Arc<Mutex<Objects>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, Objects>> {
        self.objects
            .lock()
            .map_err(|_| StorageError::config_error("in-memory store lock poisoned"))
    }

    /// Store an object directly.
    pub fn put(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>, content_type: &str) {
        if let Ok(mut objects) = self.lock() {
            objects.insert(
                (bucket.to_string(), key.to_string()),
                (data.into(), content_type.to_string()),
            );
        }
    }

    /// Fetch an object and its content type.
    pub fn get(&self, bucket: &str, key: &str) -> Option<(Vec<u8>, String)> {
        self.lock()
            .ok()?
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Sorted keys stored in `bucket`.
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .lock()
            .map(|objects| {
                objects
                    .keys()
                    .filter(|(b, _)| b == bucket)
                    .map(|(_, k)| k.clone())
                    .collect()
            })
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn url(&self, key: &str) -> String {
        format!("memory://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn for_bucket(&self, bucket: &str) -> Arc<dyn ObjectStore> {
        Arc::new(Self {
            bucket: bucket.to_string(),
            objects: Arc::clone(&self.objects),
        })
    }

    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<String> {
        require_bucket(&self.bucket, "upload_file")?;
        let data = tokio::fs::read(path).await?;
        self.upload_bytes(data, key, content_type).await
    }

    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<String> {
        require_bucket(&self.bucket, "upload_bytes")?;
        self.lock()?.insert(
            (self.bucket.clone(), key.to_string()),
            (data, content_type.to_string()),
        );
        Ok(self.url(key))
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        require_bucket(&self.bucket, "download")?;
        self.lock()?
            .get(&(self.bucket.clone(), key.to_string()))
            .map(|(data, _)| data.clone())
            .ok_or_else(|| StorageError::not_found(format!("{}/{}", self.bucket, key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upload_and_download_roundtrip_per_bucket() {
        let store = InMemoryStore::new();
        let media = store.for_bucket("media");

        let url = media.upload_bytes(b"abc".to_vec(), "u/videos/v/media.m4a", "audio/mp4").await.unwrap();
        assert_eq!(url, "memory://media/u/videos/v/media.m4a");

        assert_eq!(media.download_bytes("u/videos/v/media.m4a").await.unwrap(), b"abc");
        assert_eq!(store.get("media", "u/videos/v/media.m4a").unwrap().1, "audio/mp4");

        let other = store.for_bucket("documents");
        assert!(matches!(
            other.download_bytes("u/videos/v/media.m4a").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_unselected_bucket_is_rejected() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.download_bytes("k").await,
            Err(StorageError::NoBucketSelected(_))
        ));
    }

    #[tokio::test]
    async fn test_file_transfer() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("in.bin");
        tokio::fs::write(&src, b"payload").await.unwrap();

        let store = InMemoryStore::new();
        let docs = store.for_bucket("docs");
        docs.upload_file(&src, "a/b", "application/octet-stream").await.unwrap();

        let dest = dir.path().join("nested/out.bin");
        let written = docs.download_file("a/b", &dest).await.unwrap();
        assert_eq!(tokio::fs::read(written).await.unwrap(), b"payload");
        assert_eq!(store.keys("docs"), vec!["a/b".to_string()]);
    }
}
