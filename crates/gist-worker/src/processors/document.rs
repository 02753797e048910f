//! Uploaded document processing.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use gist_extract::DocumentExtractor;
use gist_models::{DocumentPatch, Job, ProcessingStatus};
use gist_storage::ObjectStore;

use super::{job_workdir, Extracted, SourceProcessor};
use crate::error::WorkerResult;

/// Local name used when the job carries no usable file name.
const FALLBACK_FILE_NAME: &str = "upload";

/// Downloads an uploaded file and extracts its text.
pub struct DocumentProcessor {
    extractor: Arc<DocumentExtractor>,
    documents: Arc<dyn ObjectStore>,
    work_dir: PathBuf,
}

impl DocumentProcessor {
    /// `documents` must already be bound to the documents bucket.
    pub fn new(extractor: Arc<DocumentExtractor>, documents: Arc<dyn ObjectStore>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            extractor,
            documents,
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl SourceProcessor for DocumentProcessor {
    async fn process(&self, job: &Job, document_id: &str) -> WorkerResult<Extracted> {
        let workdir = job_workdir(&self.work_dir, "document-").await?;
        let name = local_file_name(job.file_name.as_deref().unwrap_or(&job.source_id));
        let local = workdir.path().join(name);

        self.documents.download_file(&job.source_id, &local).await?;
        let outcome = self.extractor.extract(&local, document_id).await?;

        info!(
            document_id = %document_id,
            strategy = %outcome.strategy.as_str(),
            chars = outcome.text.len(),
            "Document extracted"
        );

        Ok(Extracted::new(
            ProcessingStatus::Completed,
            DocumentPatch::new(),
            outcome.text,
            outcome.strategy,
        )
        .with_diagnostic(outcome.diagnostic))
    }
}

/// Final path component of `name`, so a crafted file name cannot escape
/// the job directory.
fn local_file_name(name: &str) -> String {
    Path::new(name.trim())
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_FILE_NAME)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_file_name() {
        assert_eq!(local_file_name("report.pdf"), "report.pdf");
        assert_eq!(local_file_name("u1/documents/d1"), "d1");
        assert_eq!(local_file_name("../../etc/passwd"), "passwd");
        assert_eq!(local_file_name(".."), FALLBACK_FILE_NAME);
        assert_eq!(local_file_name(""), FALLBACK_FILE_NAME);
    }
}
