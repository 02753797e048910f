//! S3-compatible client implementation.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::store::{require_bucket, ObjectStore};

/// Configuration for the S3 client.
#[derive(Debug, Clone, Default)]
pub struct S3Config {
    /// Custom endpoint (R2, MinIO); `None` uses AWS
    pub endpoint_url: Option<String>,
    /// Region ("auto" for R2)
    pub region: String,
    /// Static credentials; when absent the SDK default chain is used
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Public base URL used to build object URLs
    pub public_base_url: Option<String>,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let access_key_id = std::env::var("S3_ACCESS_KEY_ID").ok();
        let secret_access_key = std::env::var("S3_SECRET_ACCESS_KEY").ok();

        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::config_error(
                "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together",
            ));
        }

        Ok(Self {
            endpoint_url: std::env::var("S3_ENDPOINT_URL").ok().filter(|s| !s.is_empty()),
            region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
            access_key_id,
            secret_access_key,
            public_base_url: std::env::var("S3_PUBLIC_BASE_URL")
                .ok()
                .map(|s| s.trim_end_matches('/').to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}

/// S3-compatible storage client.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl S3Client {
    /// Create a new client. No bucket is selected yet.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let region = Region::new(config.region.clone());

        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(key), Some(secret)) => Builder::new()
                .behavior_version(BehaviorVersion::latest())
                .region(region)
                .credentials_provider(Credentials::new(key, secret, None, None, "gist-static")),
            _ => {
                let shared = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                Builder::from(&shared)
            }
        };

        if let Some(endpoint) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            bucket: String::new(),
            public_base_url: config.public_base_url,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }

    /// Clone of this client bound to `bucket`.
    pub fn with_bucket(&self, bucket: impl Into<String>) -> Self {
        Self {
            client: self.client.clone(),
            bucket: bucket.into(),
            public_base_url: self.public_base_url.clone(),
        }
    }

    /// URL under which `key` is reachable.
    pub fn object_url(&self, key: &str) -> String {
        match &self.public_base_url {
            Some(base) => format!("{}/{}/{}", base, self.bucket, key),
            None => format!("s3://{}/{}", self.bucket, key),
        }
    }

    async fn put(&self, body: ByteStream, key: &str, content_type: &str) -> StorageResult<String> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(format!("{}: {}", key, e)))?;

        Ok(self.object_url(key))
    }
}

#[async_trait]
impl ObjectStore for S3Client {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn for_bucket(&self, bucket: &str) -> Arc<dyn ObjectStore> {
        Arc::new(self.with_bucket(bucket))
    }

    async fn upload_file(&self, path: &Path, key: &str, content_type: &str) -> StorageResult<String> {
        require_bucket(&self.bucket, "upload_file")?;
        debug!("Uploading {} to {}/{}", path.display(), self.bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        let url = self.put(body, key, content_type).await?;
        info!("Uploaded {} to {}/{}", path.display(), self.bucket, key);
        Ok(url)
    }

    async fn upload_bytes(&self, data: Vec<u8>, key: &str, content_type: &str) -> StorageResult<String> {
        require_bucket(&self.bucket, "upload_bytes")?;
        debug!("Uploading {} bytes to {}/{}", data.len(), self.bucket, key);

        self.put(ByteStream::from(data), key, content_type).await
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        require_bucket(&self.bucket, "download")?;
        debug!("Downloading {}/{}", self.bucket, key);

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.to_string().contains("NoSuchKey") {
                    StorageError::not_found(format!("{}/{}", self.bucket, key))
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        let bytes = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::download_failed(e.to_string()))?
            .into_bytes()
            .to_vec();

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_client() -> S3Client {
        S3Client::new(S3Config {
            endpoint_url: Some("http://localhost:9000".to_string()),
            region: "auto".to_string(),
            access_key_id: Some("key".to_string()),
            secret_access_key: Some("secret".to_string()),
            public_base_url: Some("https://cdn.example.com".to_string()),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_bucket_selection_is_explicit() {
        let client = test_client().await;
        assert_eq!(client.bucket(), "");

        let err = client.upload_bytes(vec![1, 2, 3], "k", "text/plain").await.unwrap_err();
        assert!(matches!(err, StorageError::NoBucketSelected("upload_bytes")));

        let media = client.for_bucket("media");
        assert_eq!(media.bucket(), "media");
        // The original handle is unchanged
        assert_eq!(client.bucket(), "");
    }

    #[tokio::test]
    async fn test_object_url() {
        let client = test_client().await.with_bucket("media");
        assert_eq!(
            client.object_url("u1/videos/abc/media.m4a"),
            "https://cdn.example.com/media/u1/videos/abc/media.m4a"
        );

        let private = S3Client {
            public_base_url: None,
            ..client
        };
        assert_eq!(private.object_url("k"), "s3://media/k");
    }
}
