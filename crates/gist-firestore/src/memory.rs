//! In-memory status repository.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use gist_models::{Document, DocumentPatch, NewDocument, ProcessingStatus};

use crate::error::{FirestoreError, StatusResult};
use crate::status::{decide_write, StatusRepository, WriteDecision};

/// Repository backed by a map, with the same transition rules as the
/// Firestore implementation.
#[derive(Default)]
pub struct InMemoryStatusRepository {
    documents: Mutex<HashMap<String, Document>>,
    writes: AtomicUsize,
    fail_updates: AtomicBool,
}

impl InMemoryStatusRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StatusResult<std::sync::MutexGuard<'_, HashMap<String, Document>>> {
        self.documents
            .lock()
            .map_err(|_| FirestoreError::request_failed("in-memory repository lock poisoned"))
    }

    /// Seed a document.
    pub fn insert(&self, document: Document) {
        if let Ok(mut documents) = self.lock() {
            documents.insert(document.id.clone(), document);
        }
    }

    /// Snapshot of a document.
    pub fn document(&self, document_id: &str) -> Option<Document> {
        self.lock().ok()?.get(document_id).cloned()
    }

    /// Number of status writes actually applied.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make every subsequent `update_status` fail with a server error.
    pub fn fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl StatusRepository for InMemoryStatusRepository {
    async fn update_status(
        &self,
        document_id: &str,
        status: ProcessingStatus,
        patch: DocumentPatch,
    ) -> StatusResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(FirestoreError::ServerError(503, "injected failure".to_string()));
        }

        let mut documents = self.lock()?;
        let document = documents
            .get_mut(document_id)
            .ok_or_else(|| FirestoreError::not_found(document_id.to_string()))?;

        if decide_write(document, status, &patch)? == WriteDecision::Skip {
            return Ok(());
        }

        document.apply(status, &patch);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn create_document(&self, document: NewDocument) -> StatusResult<String> {
        let document = document.into_document();
        let id = document.id.clone();

        let mut documents = self.lock()?;
        if documents.contains_key(&id) {
            return Err(FirestoreError::AlreadyExists(id));
        }
        documents.insert(id.clone(), document);
        Ok(id)
    }

    async fn get_document(&self, document_id: &str) -> StatusResult<Option<Document>> {
        Ok(self.lock()?.get(document_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use gist_models::ExtractionStrategy;

    use super::*;

    #[tokio::test]
    async fn test_same_terminal_status_twice_writes_once() {
        let repo = InMemoryStatusRepository::new();
        let id = repo
            .create_document(NewDocument::new("u1", "Doc", "document"))
            .await
            .unwrap();

        repo.update_status(&id, ProcessingStatus::Processing, DocumentPatch::new())
            .await
            .unwrap();

        let patch = DocumentPatch::new()
            .transcription("hello")
            .strategy(ExtractionStrategy::PlainText);
        repo.update_status(&id, ProcessingStatus::Completed, patch.clone())
            .await
            .unwrap();
        repo.update_status(&id, ProcessingStatus::Completed, patch)
            .await
            .unwrap();

        assert_eq!(repo.write_count(), 2);
        let doc = repo.document(&id).unwrap();
        assert_eq!(doc.processing_status, ProcessingStatus::Completed);
        assert_eq!(doc.transcription.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn test_terminal_regression_rejected() {
        let repo = InMemoryStatusRepository::new();
        let id = repo
            .create_document(NewDocument::new("u1", "Doc", "video"))
            .await
            .unwrap();
        repo.update_status(&id, ProcessingStatus::Processing, DocumentPatch::new())
            .await
            .unwrap();
        repo.update_status(&id, ProcessingStatus::Transcribed, DocumentPatch::new())
            .await
            .unwrap();

        let result = repo
            .update_status(&id, ProcessingStatus::Error, DocumentPatch::error("late failure"))
            .await;
        assert!(matches!(result, Err(FirestoreError::InvalidTransition { .. })));
        assert_eq!(
            repo.document(&id).unwrap().processing_status,
            ProcessingStatus::Transcribed
        );
    }

    #[tokio::test]
    async fn test_missing_document() {
        let repo = InMemoryStatusRepository::new();
        assert!(repo.get_document("nope").await.unwrap().is_none());
        assert!(matches!(
            repo.update_status("nope", ProcessingStatus::Processing, DocumentPatch::new())
                .await,
            Err(FirestoreError::NotFound(_))
        ));
    }
}
