//! Firestore REST API client.
//!
//! Production-grade client with:
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter
//! - Observability (tracing spans, metrics)

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::RetryConfig;
use crate::token_cache::TokenCache;
use crate::types::{Document, Value};

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Collection holding document records
    pub documents_collection: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::auth_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.is_empty() {
            return Err(FirestoreError::auth_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            documents_collection: std::env::var("FIRESTORE_DOCUMENTS_COLLECTION")
                .unwrap_or_else(|_| "documents".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    base_url: String,
    token_cache: Arc<TokenCache>,
}

impl FirestoreClient {
    /// Create a new Firestore client authenticated with the service account
    /// from `GOOGLE_APPLICATION_CREDENTIALS`, or application default
    /// credentials when that is unset.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let auth = Self::create_auth_provider().await?;
        let base_url = format!(
            "https://firestore.googleapis.com/v1/projects/{}/databases/{}/documents",
            config.project_id, config.database_id
        );
        Self::with_endpoint(config, base_url, TokenCache::new(auth))
    }

    /// Create a client against an explicit documents endpoint (emulator, tests).
    pub fn with_endpoint(
        config: FirestoreConfig,
        base_url: impl Into<String>,
        token_cache: TokenCache,
    ) -> FirestoreResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("gist-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        Ok(Self {
            http,
            config,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_cache: Arc::new(token_cache),
        })
    }

    async fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env()
            .map_err(|e| FirestoreError::auth_error(format!("Failed to load service account: {}", e)))?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => gcp_auth::provider()
                .await
                .map_err(|e| FirestoreError::auth_error(format!("No GCP credentials available: {}", e))),
        }
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        let config = FirestoreConfig::from_env()?;
        Self::new(config).await
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    fn document_path(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", self.base_url, collection, doc_id)
    }

    /// Send an authenticated request, refreshing the token once when the
    /// server reports it expired.
    async fn send_authorized<B>(&self, url: &str, build: B) -> FirestoreResult<Response>
    where
        B: Fn(&str) -> RequestBuilder,
    {
        let token = self.token_cache.get_token().await?;
        let response = build(&token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if !Self::is_access_token_expired(&body) {
            return Err(FirestoreError::from_http_status(
                StatusCode::UNAUTHORIZED.as_u16(),
                format!("{} failed: {}", url, body),
            ));
        }

        debug!("Firestore token expired, refreshing");
        self.token_cache.invalidate().await;
        let token = self.token_cache.get_token().await?;
        Ok(build(&token).send().await?)
    }

    /// Get a document.
    pub async fn get_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<Option<Document>> {
        let url = self.document_path(collection, doc_id);

        self.execute_request("get_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.get(&url).bearer_auth(token))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(Some(response.json().await?)),
                StatusCode::NOT_FOUND => Ok(None),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Create a document with a caller-chosen id.
    pub async fn create_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
    ) -> FirestoreResult<Document> {
        let url = format!(
            "{}/{}?documentId={}",
            self.base_url,
            collection,
            urlencoding::encode(doc_id)
        );
        let body = Document::new(fields);

        self.execute_request("create_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.post(&url).bearer_auth(token).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK | StatusCode::CREATED => Ok(response.json().await?),
                StatusCode::CONFLICT => Err(FirestoreError::AlreadyExists(format!("{}/{}", collection, doc_id))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Update a document. Only the fields named in `update_mask` are
    /// touched; fields in the mask but absent from `fields` are removed.
    pub async fn update_document(
        &self,
        collection: &str,
        doc_id: &str,
        fields: HashMap<String, Value>,
        update_mask: Option<Vec<String>>,
    ) -> FirestoreResult<Document> {
        let mut url = self.document_path(collection, doc_id);
        let mut params: Vec<String> = update_mask
            .unwrap_or_default()
            .iter()
            .map(|f| format!("updateMask.fieldPaths={}", urlencoding::encode(f)))
            .collect();
        // Never create a document through a status patch
        params.push("currentDocument.exists=true".to_string());
        url = format!("{}?{}", url, params.join("&"));

        let body = Document::new(fields);

        self.execute_request("update_document", collection, Some(doc_id), async {
            let response = self
                .send_authorized(&url, |token| self.http.patch(&url).bearer_auth(token).json(&body))
                .await?;

            match response.status() {
                StatusCode::OK => Ok(response.json().await?),
                StatusCode::NOT_FOUND => Err(FirestoreError::not_found(format!("{}/{}", collection, doc_id))),
                status => Err(Self::handle_error_response(status, &url, response).await),
            }
        })
        .await
    }

    /// Execute with retry.
    pub async fn with_retry<T, F, Fut>(&self, operation: &str, op: F) -> FirestoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = FirestoreResult<T>>,
    {
        crate::retry::with_retry(&self.config.retry, operation, op).await
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(
        &self,
        operation: &str,
        collection: &str,
        doc_id: Option<&str>,
        fut: F,
    ) -> FirestoreResult<T>
    where
        F: std::future::Future<Output = FirestoreResult<T>>,
    {
        let span = info_span!(
            "firestore_request",
            operation = %operation,
            collection = %collection,
            doc_id = doc_id.unwrap_or("")
        );

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let body = response.text().await.unwrap_or_default();
        FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body))
    }
}
