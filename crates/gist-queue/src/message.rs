//! Queue payload normalization.
//!
//! Producers have written both snake_case and camelCase field names over
//! time. Both are accepted here, once, and everything downstream only sees
//! the canonical [`Job`].

use serde::Deserialize;

use gist_models::{Job, ProcessingOptions, SourceType};

use crate::error::{QueueError, QueueResult};

/// Wire shape of a queue message. Unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default, alias = "videoId")]
    video_id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, alias = "documentId")]
    document_id: Option<String>,
    #[serde(default, alias = "userId")]
    user_id: Option<String>,
    #[serde(default, alias = "sourceUrl")]
    source_url: Option<String>,
    #[serde(default, alias = "collectionId")]
    collection_id: Option<String>,
    #[serde(default, alias = "filePath", alias = "storage_key", alias = "storageKey")]
    file_path: Option<String>,
    #[serde(default, alias = "fileName")]
    file_name: Option<String>,
    #[serde(default, alias = "processingOptions")]
    processing_options: Option<ProcessingOptions>,
}

/// Parse a message body received from the queue for `source_type`.
pub fn parse_job(source_type: SourceType, message_id: &str, body: &str) -> QueueResult<Job> {
    let raw: RawMessage = serde_json::from_str(body)
        .map_err(|e| QueueError::invalid_message(format!("Malformed JSON body: {}", e)))?;

    let user_id = non_empty(raw.user_id)
        .ok_or_else(|| QueueError::invalid_message("Missing user_id"))?;
    let document_id = non_empty(raw.document_id);
    let source_url = non_empty(raw.source_url);

    let source_id = match source_type {
        SourceType::Video => non_empty(raw.video_id).or_else(|| non_empty(raw.url.clone())),
        SourceType::Website => non_empty(raw.url.clone()).or_else(|| source_url.clone()),
        SourceType::Document => non_empty(raw.file_path).or_else(|| {
            document_id
                .as_ref()
                .map(|id| format!("{}/documents/{}", user_id, id))
        }),
    }
    .ok_or_else(|| {
        QueueError::invalid_message(format!("Missing source identifier for {} job", source_type))
    })?;

    let processing_options = raw.processing_options.unwrap_or_default();
    let collection_id = non_empty(raw.collection_id).or_else(|| processing_options.collection_id.clone());

    Ok(Job {
        source_type,
        source_id,
        user_id,
        document_id,
        collection_id,
        source_url: source_url.or_else(|| non_empty(raw.url)),
        file_name: non_empty(raw.file_name),
        processing_options,
        queue_message_id: message_id.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
