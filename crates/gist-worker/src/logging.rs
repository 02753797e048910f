//! Structured job logging utilities.
//!
//! Provides consistent lifecycle lines for queue jobs, tagged with the
//! message id, source type and (once resolved) the document id.

use tracing::{error, info, warn, Span};

use gist_models::{Job, SourceType};

/// Job logger for structured logging with consistent formatting.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    source_type: SourceType,
    document_id: Option<String>,
}

impl JobLogger {
    /// Create a logger for a decoded job, keyed by its queue message id.
    pub fn new(job: &Job) -> Self {
        Self {
            job_id: job.queue_message_id.clone(),
            source_type: job.source_type,
            document_id: job.document_id.clone(),
        }
    }

    /// Create a logger for a raw message that has not been decoded yet.
    pub fn from_message(message_id: &str, source_type: SourceType) -> Self {
        Self {
            job_id: message_id.to_string(),
            source_type,
            document_id: None,
        }
    }

    /// Attach the resolved document id.
    pub fn with_document(mut self, document_id: &str) -> Self {
        self.document_id = Some(document_id.to_string());
        self
    }

    fn document(&self) -> &str {
        self.document_id.as_deref().unwrap_or("-")
    }

    /// Log the start of a job.
    pub fn log_start(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            source_type = %self.source_type,
            document_id = %self.document(),
            "Job started: {}", message
        );
    }

    /// Log a progress update during job execution.
    pub fn log_progress(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            source_type = %self.source_type,
            document_id = %self.document(),
            "Job progress: {}", message
        );
    }

    /// Log a warning during job execution.
    pub fn log_warning(&self, message: &str) {
        warn!(
            job_id = %self.job_id,
            source_type = %self.source_type,
            document_id = %self.document(),
            "Job warning: {}", message
        );
    }

    /// Log an error during job execution.
    pub fn log_error(&self, message: &str) {
        error!(
            job_id = %self.job_id,
            source_type = %self.source_type,
            document_id = %self.document(),
            "Job error: {}", message
        );
    }

    /// Log the completion of a job.
    pub fn log_completion(&self, message: &str) {
        info!(
            job_id = %self.job_id,
            source_type = %self.source_type,
            document_id = %self.document(),
            "Job completed: {}", message
        );
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    /// Span wrapping the processing of this job.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "job",
            job_id = %self.job_id,
            source_type = %self.source_type,
            document_id = %self.document()
        )
    }
}
