//! Website processing.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use gist_extract::WebsiteExtractor;
use gist_models::{DocumentPatch, Job, ProcessingStatus};
use gist_storage::{gzip, keys, ObjectStore, GZIP_CONTENT_TYPE};

use super::{Extracted, SourceProcessor};
use crate::error::WorkerResult;

/// Extracts a page's main content and archives the raw HTML.
pub struct WebsiteProcessor {
    extractor: Arc<WebsiteExtractor>,
    artifacts: Arc<dyn ObjectStore>,
}

impl WebsiteProcessor {
    /// `artifacts` must already be bound to the artifacts bucket.
    pub fn new(extractor: Arc<WebsiteExtractor>, artifacts: Arc<dyn ObjectStore>) -> Self {
        Self { extractor, artifacts }
    }

    /// Store the gzipped raw HTML; returns its URL.
    async fn archive(&self, user_id: &str, document_id: &str, html: &str) -> WorkerResult<String> {
        let key = keys::raw_scrape_key(user_id, document_id);
        let data = gzip(html.as_bytes())?;
        let url = self.artifacts.upload_bytes(data, &key, GZIP_CONTENT_TYPE).await?;
        debug!(document_id = %document_id, key = %key, "Archived raw HTML");
        Ok(url)
    }
}

#[async_trait]
impl SourceProcessor for WebsiteProcessor {
    async fn process(&self, job: &Job, document_id: &str) -> WorkerResult<Extracted> {
        let extraction = self.extractor.extract(&job.source_id).await?;

        let raw_url = self.archive(&job.user_id, document_id, &extraction.raw_html).await?;

        let title = extraction.title.clone().unwrap_or_else(|| extraction.url.clone());
        let patch = DocumentPatch::new()
            .title(title)
            .source_url(extraction.url.clone())
            .raw_content_url(raw_url);

        info!(
            url = %extraction.url,
            strategy = %extraction.outcome.strategy.as_str(),
            "Website extracted"
        );

        let outcome = extraction.outcome;
        Ok(Extracted::new(ProcessingStatus::Completed, patch, outcome.text, outcome.strategy)
            .with_diagnostic(outcome.diagnostic))
    }
}
