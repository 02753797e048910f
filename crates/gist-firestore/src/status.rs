//! Document status repository.
//!
//! The worker only talks to durable storage through [`StatusRepository`]:
//! creating a record for jobs that arrive without one, reading the current
//! state, and writing status + patch pairs by document id.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use gist_models::{Document, DocumentPatch, ExtractionStrategy, NewDocument, ProcessingStatus};

use crate::client::FirestoreClient;
use crate::error::{FirestoreError, StatusResult};
use crate::metrics::record_skipped_write;
use crate::types::{self, ToFirestoreValue, Value};

/// Durable document state as seen by the worker.
#[async_trait]
pub trait StatusRepository: Send + Sync {
    /// Set `status` and apply `patch` to the document.
    ///
    /// Re-writing the same terminal status with a patch the document already
    /// reflects issues no write. Regressions out of a terminal state other
    /// than an explicit requeue fail with `InvalidTransition`.
    async fn update_status(
        &self,
        document_id: &str,
        status: ProcessingStatus,
        patch: DocumentPatch,
    ) -> StatusResult<()>;

    /// Create a new `queued` document, returning its id.
    async fn create_document(&self, document: NewDocument) -> StatusResult<String>;

    /// Fetch a document.
    async fn get_document(&self, document_id: &str) -> StatusResult<Option<Document>>;
}

/// What `update_status` should do given the stored document.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum WriteDecision {
    Write,
    Skip,
}

/// Shared transition check for all repository implementations.
pub(crate) fn decide_write(
    current: &Document,
    status: ProcessingStatus,
    patch: &DocumentPatch,
) -> StatusResult<WriteDecision> {
    let from = current.processing_status;

    if !from.can_transition_to(status) {
        return Err(FirestoreError::InvalidTransition {
            document_id: current.id.clone(),
            from,
            to: status,
        });
    }

    if from == status && status.is_terminal() && patch.is_satisfied_by(current) {
        record_skipped_write(status.as_str());
        return Ok(WriteDecision::Skip);
    }

    Ok(WriteDecision::Write)
}

/// Field names of a stored document.
mod fields {
    pub const USER_ID: &str = "user_id";
    pub const TITLE: &str = "title";
    pub const CONTENT_TYPE: &str = "content_type";
    pub const SOURCE_URL: &str = "source_url";
    pub const COLLECTION_ID: &str = "collection_id";
    pub const PROCESSING_STATUS: &str = "processing_status";
    pub const TRANSCRIPTION: &str = "transcription";
    pub const ERROR_MESSAGE: &str = "error_message";
    pub const MEDIA_URL: &str = "media_url";
    pub const RAW_CONTENT_URL: &str = "raw_content_url";
    pub const EXTRACTION_STRATEGY: &str = "extraction_strategy";
    pub const CREATED_AT: &str = "created_at";
    pub const UPDATED_AT: &str = "updated_at";
}

/// Firestore-backed repository.
pub struct FirestoreStatusRepository {
    client: FirestoreClient,
    collection: String,
}

impl FirestoreStatusRepository {
    pub fn new(client: FirestoreClient) -> Self {
        let collection = client.config().documents_collection.clone();
        Self { client, collection }
    }

    /// Create from environment variables.
    pub async fn from_env() -> StatusResult<Self> {
        Ok(Self::new(FirestoreClient::from_env().await?))
    }

    fn to_fields(document: &Document) -> HashMap<String, Value> {
        let mut map = HashMap::new();
        map.insert(fields::USER_ID.to_string(), document.user_id.to_firestore_value());
        map.insert(fields::TITLE.to_string(), document.title.to_firestore_value());
        map.insert(fields::CONTENT_TYPE.to_string(), document.content_type.to_firestore_value());
        map.insert(fields::SOURCE_URL.to_string(), document.source_url.to_firestore_value());
        map.insert(fields::COLLECTION_ID.to_string(), document.collection_id.to_firestore_value());
        map.insert(
            fields::PROCESSING_STATUS.to_string(),
            document.processing_status.as_str().to_firestore_value(),
        );
        map.insert(fields::CREATED_AT.to_string(), document.created_at.to_firestore_value());
        map.insert(fields::UPDATED_AT.to_string(), document.updated_at.to_firestore_value());
        map
    }

    fn from_firestore(id: &str, doc: &types::Document) -> StatusResult<Document> {
        let status_str: String = doc.get(fields::PROCESSING_STATUS).unwrap_or_default();
        let processing_status = ProcessingStatus::parse(&status_str).ok_or_else(|| {
            FirestoreError::invalid_response(format!(
                "Document {} has unknown processing_status '{}'",
                id, status_str
            ))
        })?;

        let created_at: DateTime<Utc> = doc.get(fields::CREATED_AT).unwrap_or_else(Utc::now);

        Ok(Document {
            id: id.to_string(),
            user_id: doc.get(fields::USER_ID).unwrap_or_default(),
            title: doc.get(fields::TITLE).unwrap_or_default(),
            content_type: doc.get(fields::CONTENT_TYPE).unwrap_or_default(),
            source_url: doc.get(fields::SOURCE_URL),
            collection_id: doc.get(fields::COLLECTION_ID),
            processing_status,
            transcription: doc.get(fields::TRANSCRIPTION),
            error_message: doc.get(fields::ERROR_MESSAGE),
            media_url: doc.get(fields::MEDIA_URL),
            raw_content_url: doc.get(fields::RAW_CONTENT_URL),
            extraction_strategy: doc
                .get::<String>(fields::EXTRACTION_STRATEGY)
                .and_then(|s| ExtractionStrategy::parse(&s)),
            created_at,
            updated_at: doc.get(fields::UPDATED_AT).unwrap_or(created_at),
        })
    }

    /// Fields and update mask for a status write.
    fn patch_fields(status: ProcessingStatus, patch: &DocumentPatch) -> (HashMap<String, Value>, Vec<String>) {
        let mut map = HashMap::new();

        let optional = [
            (fields::TITLE, &patch.title),
            (fields::CONTENT_TYPE, &patch.content_type),
            (fields::SOURCE_URL, &patch.source_url),
            (fields::TRANSCRIPTION, &patch.transcription),
            (fields::ERROR_MESSAGE, &patch.error_message),
            (fields::MEDIA_URL, &patch.media_url),
            (fields::RAW_CONTENT_URL, &patch.raw_content_url),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                map.insert(name.to_string(), value.to_firestore_value());
            }
        }
        if patch.clears_error_message() {
            map.insert(fields::ERROR_MESSAGE.to_string(), Value::NullValue(()));
        }
        if let Some(strategy) = patch.extraction_strategy {
            map.insert(
                fields::EXTRACTION_STRATEGY.to_string(),
                strategy.as_str().to_firestore_value(),
            );
        }

        map.insert(fields::PROCESSING_STATUS.to_string(), status.as_str().to_firestore_value());
        map.insert(fields::UPDATED_AT.to_string(), Utc::now().to_firestore_value());

        let mut mask: Vec<String> = map.keys().cloned().collect();
        mask.sort();
        (map, mask)
    }
}

#[async_trait]
impl StatusRepository for FirestoreStatusRepository {
    async fn update_status(
        &self,
        document_id: &str,
        status: ProcessingStatus,
        patch: DocumentPatch,
    ) -> StatusResult<()> {
        let current = self
            .get_document(document_id)
            .await?
            .ok_or_else(|| FirestoreError::not_found(format!("{}/{}", self.collection, document_id)))?;

        if decide_write(&current, status, &patch)? == WriteDecision::Skip {
            debug!(document_id = %document_id, status = %status, "Status already recorded, skipping write");
            return Ok(());
        }

        let (map, mask) = Self::patch_fields(status, &patch);
        self.client
            .with_retry("update_status", || {
                self.client
                    .update_document(&self.collection, document_id, map.clone(), Some(mask.clone()))
            })
            .await?;

        info!(document_id = %document_id, status = %status, "Updated document status");
        Ok(())
    }

    async fn create_document(&self, document: NewDocument) -> StatusResult<String> {
        let document = document.into_document();
        let map = Self::to_fields(&document);

        self.client
            .with_retry("create_document", || {
                self.client.create_document(&self.collection, &document.id, map.clone())
            })
            .await?;

        info!(document_id = %document.id, user_id = %document.user_id, "Created document");
        Ok(document.id)
    }

    async fn get_document(&self, document_id: &str) -> StatusResult<Option<Document>> {
        let doc = self
            .client
            .with_retry("get_document", || self.client.get_document(&self.collection, document_id))
            .await?;

        doc.map(|d| Self::from_firestore(document_id, &d)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(status: ProcessingStatus) -> Document {
        let mut doc = NewDocument::new("u1", "Title", "website").into_document();
        doc.processing_status = status;
        doc
    }

    #[test]
    fn test_decide_write_skips_repeated_terminal_status() {
        let mut doc = stored(ProcessingStatus::Completed);
        doc.transcription = Some("text".into());

        let patch = DocumentPatch::new().transcription("text");
        assert_eq!(
            decide_write(&doc, ProcessingStatus::Completed, &patch).unwrap(),
            WriteDecision::Skip
        );

        let changed = DocumentPatch::new().transcription("other");
        assert_eq!(
            decide_write(&doc, ProcessingStatus::Completed, &changed).unwrap(),
            WriteDecision::Write
        );
    }

    #[test]
    fn test_decide_write_rejects_regression() {
        let doc = stored(ProcessingStatus::Transcribed);
        let err = decide_write(&doc, ProcessingStatus::Processing, &DocumentPatch::new()).unwrap_err();
        assert!(matches!(
            err,
            FirestoreError::InvalidTransition {
                from: ProcessingStatus::Transcribed,
                to: ProcessingStatus::Processing,
                ..
            }
        ));
    }

    #[test]
    fn test_patch_fields_mask_covers_only_set_fields() {
        let patch = DocumentPatch::new()
            .title("T")
            .strategy(ExtractionStrategy::PdfOcr);
        let (map, mask) = FirestoreStatusRepository::patch_fields(ProcessingStatus::Completed, &patch);

        assert_eq!(
            mask,
            vec!["extraction_strategy", "processing_status", "title", "updated_at"]
        );
        assert_eq!(map["extraction_strategy"], Value::StringValue("pdf_ocr".into()));
        assert_eq!(map["processing_status"], Value::StringValue("completed".into()));
    }

    #[test]
    fn test_patch_fields_writes_null_to_clear_error() {
        let patch = DocumentPatch::new().transcription("text").clear_error_message();
        let (map, mask) = FirestoreStatusRepository::patch_fields(ProcessingStatus::Completed, &patch);

        assert!(mask.contains(&"error_message".to_string()));
        assert_eq!(map["error_message"], Value::NullValue(()));

        let (map, _) = FirestoreStatusRepository::patch_fields(
            ProcessingStatus::Error,
            &DocumentPatch::error("boom").clear_error_message(),
        );
        assert_eq!(map["error_message"], Value::StringValue("boom".into()));
    }

    #[test]
    fn test_from_firestore_rejects_unknown_status() {
        let mut map = HashMap::new();
        map.insert("processing_status".to_string(), Value::StringValue("weird".into()));
        let doc = types::Document::new(map);
        assert!(matches!(
            FirestoreStatusRepository::from_firestore("d", &doc),
            Err(FirestoreError::InvalidResponse(_))
        ));
    }
}
