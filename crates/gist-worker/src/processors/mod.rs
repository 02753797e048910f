//! Per-source processors and the router the dispatcher hands jobs to.
//!
//! A processor turns a job into an [`Extracted`] result; the router owns the
//! document lifecycle around it (duplicate check, `processing`, the final
//! status patch and summary scheduling).

pub mod document;
pub mod video;
pub mod website;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use gist_firestore::StatusRepository;
use gist_models::{DocumentPatch, ExtractionStrategy, Job, ProcessingStatus, SourceType};

use crate::error::{WorkerError, WorkerResult};
use crate::scheduler::{summary_requests, BestEffortScheduler};

pub use document::DocumentProcessor;
pub use video::VideoProcessor;
pub use website::WebsiteProcessor;

/// How a job ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed { strategy: ExtractionStrategy },
    /// The document was already extracted by an earlier delivery
    Skipped,
}

/// Handles one decoded job against its document.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job, document_id: &str) -> WorkerResult<JobOutcome>;
}

/// Text and patch produced by a processor.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub status: ProcessingStatus,
    pub patch: DocumentPatch,
    pub text: String,
    pub strategy: ExtractionStrategy,
    pub diagnostic: Option<String>,
}

impl Extracted {
    /// `patch` gets the transcription and strategy filled in, and any error
    /// left by an earlier attempt is cleared.
    pub fn new(status: ProcessingStatus, patch: DocumentPatch, text: String, strategy: ExtractionStrategy) -> Self {
        let patch = patch
            .transcription(text.clone())
            .strategy(strategy)
            .clear_error_message();
        Self {
            status,
            patch,
            text,
            strategy,
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: Option<String>) -> Self {
        self.diagnostic = diagnostic;
        self
    }
}

/// Source-specific extraction.
#[async_trait]
pub trait SourceProcessor: Send + Sync {
    async fn process(&self, job: &Job, document_id: &str) -> WorkerResult<Extracted>;
}

/// Routes jobs to the processor for their source type.
pub struct ProcessorRouter {
    status: Arc<dyn StatusRepository>,
    scheduler: BestEffortScheduler,
    video: Arc<dyn SourceProcessor>,
    website: Arc<dyn SourceProcessor>,
    document: Arc<dyn SourceProcessor>,
}

impl ProcessorRouter {
    pub fn new(
        status: Arc<dyn StatusRepository>,
        scheduler: BestEffortScheduler,
        video: Arc<dyn SourceProcessor>,
        website: Arc<dyn SourceProcessor>,
        document: Arc<dyn SourceProcessor>,
    ) -> Self {
        Self {
            status,
            scheduler,
            video,
            website,
            document,
        }
    }

    fn processor(&self, source_type: SourceType) -> &Arc<dyn SourceProcessor> {
        match source_type {
            SourceType::Video => &self.video,
            SourceType::Website => &self.website,
            SourceType::Document => &self.document,
        }
    }
}

#[async_trait]
impl JobHandler for ProcessorRouter {
    async fn handle(&self, job: &Job, document_id: &str) -> WorkerResult<JobOutcome> {
        if let Some(document) = self.status.get_document(document_id).await? {
            if document.processing_status.is_success() {
                info!(
                    document_id = %document_id,
                    status = %document.processing_status,
                    "Document already extracted, skipping duplicate delivery"
                );
                return Ok(JobOutcome::Skipped);
            }
        }

        self.status
            .update_status(document_id, ProcessingStatus::Processing, DocumentPatch::new())
            .await?;

        let extracted = self.processor(job.source_type).process(job, document_id).await?;

        if let Some(diagnostic) = &extracted.diagnostic {
            info!(document_id = %document_id, diagnostic = %diagnostic, "Extraction diagnostic");
        }

        self.status
            .update_status(document_id, extracted.status, extracted.patch)
            .await?;

        let requests = summary_requests(job, document_id, &extracted.text);
        if !requests.is_empty() {
            debug!(document_id = %document_id, count = requests.len(), "Scheduling summaries");
            self.scheduler.schedule(requests);
        }

        Ok(JobOutcome::Completed {
            strategy: extracted.strategy,
        })
    }
}

/// Per-job scratch directory under the configured work directory.
pub(crate) async fn job_workdir(work_dir: &Path, prefix: &str) -> WorkerResult<tempfile::TempDir> {
    tokio::fs::create_dir_all(work_dir).await?;
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(work_dir)
        .map_err(WorkerError::from)
}
