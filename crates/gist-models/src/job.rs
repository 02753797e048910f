//! Job definitions for queue-driven processing.

use serde::{Deserialize, Serialize};

/// Kind of content a job refers to.
///
/// Each source type has its own queue; the type of a job is decided by the
/// queue it was received from, never by the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Video,
    Website,
    Document,
}

impl SourceType {
    /// All source types in dispatcher polling order.
    pub const ALL: [SourceType; 3] = [SourceType::Video, SourceType::Website, SourceType::Document];

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Video => "video",
            SourceType::Website => "website",
            SourceType::Document => "document",
        }
    }

    /// Content type recorded on documents created for this source.
    pub fn content_type(&self) -> &'static str {
        match self {
            SourceType::Video => "video",
            SourceType::Website => "website",
            SourceType::Document => "document",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Options controlling downstream work after extraction.
///
/// Read-only for the worker: forwarded verbatim to summary scheduling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOptions {
    #[serde(default, alias = "generate_short_form")]
    pub generate_short_form: bool,
    #[serde(default, alias = "generate_long_form")]
    pub generate_long_form: bool,
    #[serde(default, alias = "generate_audio")]
    pub generate_audio: bool,
    #[serde(default, alias = "collection_id", skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
}

impl ProcessingOptions {
    /// True when any summary should be scheduled after extraction.
    pub fn wants_summaries(&self) -> bool {
        self.generate_short_form || self.generate_long_form
    }
}

/// One unit of extraction work decoded from a queue message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub source_type: SourceType,
    /// Video id/URL, page URL, or object key of an uploaded file.
    pub source_id: String,
    pub user_id: String,
    /// Target document; created by the dispatcher when absent.
    pub document_id: Option<String>,
    pub collection_id: Option<String>,
    pub source_url: Option<String>,
    /// Original filename of an uploaded document, used for type sniffing.
    pub file_name: Option<String>,
    pub processing_options: ProcessingOptions,
    /// Queue receipt id; the handle used to delete the message.
    pub queue_message_id: String,
}

impl Job {
    /// Collection the job belongs to, preferring the top-level field.
    pub fn collection(&self) -> Option<&str> {
        self.collection_id
            .as_deref()
            .or(self.processing_options.collection_id.as_deref())
    }

    /// Human-readable short label for logs.
    pub fn label(&self) -> String {
        format!("{}:{}", self.source_type, self.source_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_processing_options_accepts_both_casings() {
        let camel: ProcessingOptions = serde_json::from_str(
            r#"{"generateShortForm": true, "generateAudio": true, "collectionId": "c1"}"#,
        )
        .unwrap();
        let snake: ProcessingOptions = serde_json::from_str(
            r#"{"generate_short_form": true, "generate_audio": true, "collection_id": "c1"}"#,
        )
        .unwrap();

        assert_eq!(camel, snake);
        assert!(camel.generate_short_form);
        assert!(!camel.generate_long_form);
        assert_eq!(camel.collection_id.as_deref(), Some("c1"));
    }

    #[test]
    fn test_processing_options_defaults() {
        let options: ProcessingOptions = serde_json::from_str("{}").unwrap();
        assert!(!options.wants_summaries());
        assert!(options.collection_id.is_none());
    }

    #[test]
    fn test_job_collection_falls_back_to_options() {
        let job = Job {
            source_type: SourceType::Website,
            source_id: "https://example.com".to_string(),
            user_id: "u1".to_string(),
            document_id: None,
            collection_id: None,
            source_url: None,
            file_name: None,
            processing_options: ProcessingOptions {
                collection_id: Some("from-options".to_string()),
                ..Default::default()
            },
            queue_message_id: "1-0".to_string(),
        };

        assert_eq!(job.collection(), Some("from-options"));
        assert_eq!(job.label(), "website:https://example.com");
    }

    #[test]
    fn test_source_type_order() {
        assert_eq!(
            SourceType::ALL,
            [SourceType::Video, SourceType::Website, SourceType::Document]
        );
        assert_eq!(SourceType::Document.to_string(), "document");
    }
}
