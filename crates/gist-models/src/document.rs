//! Durable document records and their processing lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::extraction::ExtractionStrategy;

/// Processing status of a document.
///
/// Lifecycle: `queued → processing → {completed | transcribed | error}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Waiting for a worker
    #[default]
    Queued,
    /// A worker is extracting content
    Processing,
    /// Text extracted from a website or document
    Completed,
    /// Transcript stored for a video
    Transcribed,
    /// Extraction failed; see `error_message`
    Error,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Queued => "queued",
            ProcessingStatus::Processing => "processing",
            ProcessingStatus::Completed => "completed",
            ProcessingStatus::Transcribed => "transcribed",
            ProcessingStatus::Error => "error",
        }
    }

    /// Parse the stored string form.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "queued" => Some(ProcessingStatus::Queued),
            "processing" => Some(ProcessingStatus::Processing),
            "completed" => Some(ProcessingStatus::Completed),
            "transcribed" => Some(ProcessingStatus::Transcribed),
            "error" => Some(ProcessingStatus::Error),
            _ => None,
        }
    }

    /// Check if this is a terminal state for the current job attempt.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ProcessingStatus::Completed | ProcessingStatus::Transcribed | ProcessingStatus::Error
        )
    }

    /// Terminal states that carry extracted content.
    pub fn is_success(&self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Transcribed)
    }

    /// Whether moving from `self` to `next` is a valid transition.
    ///
    /// Writing the current status again is always allowed. Leaving a terminal
    /// state is only possible through an external re-enqueue, which starts a
    /// new job from `queued` (or `processing` for a failed document).
    pub fn can_transition_to(&self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;

        if *self == next {
            return true;
        }

        match self {
            Queued => matches!(next, Processing | Error),
            Processing => matches!(next, Completed | Transcribed | Error),
            Error => matches!(next, Queued | Processing),
            Completed | Transcribed => matches!(next, Queued),
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stored document record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content_type: String,
    pub source_url: Option<String>,
    pub collection_id: Option<String>,
    pub processing_status: ProcessingStatus,
    pub transcription: Option<String>,
    pub error_message: Option<String>,
    /// Object storage URL of downloaded media (videos without captions)
    pub media_url: Option<String>,
    /// Object storage URL of the raw scrape (websites)
    pub raw_content_url: Option<String>,
    pub extraction_strategy: Option<ExtractionStrategy>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    /// Apply a patch and status in place, bumping `updated_at`.
    pub fn apply(&mut self, status: ProcessingStatus, patch: &DocumentPatch) {
        self.processing_status = status;
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content_type) = &patch.content_type {
            self.content_type = content_type.clone();
        }
        if let Some(source_url) = &patch.source_url {
            self.source_url = Some(source_url.clone());
        }
        if let Some(transcription) = &patch.transcription {
            self.transcription = Some(transcription.clone());
        }
        if let Some(error_message) = &patch.error_message {
            self.error_message = Some(error_message.clone());
        } else if patch.clear_error_message {
            self.error_message = None;
        }
        if let Some(media_url) = &patch.media_url {
            self.media_url = Some(media_url.clone());
        }
        if let Some(raw_content_url) = &patch.raw_content_url {
            self.raw_content_url = Some(raw_content_url.clone());
        }
        if let Some(strategy) = patch.extraction_strategy {
            self.extraction_strategy = Some(strategy);
        }
        self.updated_at = Utc::now();
    }
}

/// Fields for a document created by the worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content_type: String,
    pub source_url: Option<String>,
    pub collection_id: Option<String>,
}

impl NewDocument {
    /// Create a new document description with a fresh id.
    pub fn new(user_id: impl Into<String>, title: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            content_type: content_type.into(),
            source_url: None,
            collection_id: None,
        }
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_collection(mut self, collection_id: Option<String>) -> Self {
        self.collection_id = collection_id;
        self
    }

    /// Materialize the record as stored, in `queued` state.
    pub fn into_document(self) -> Document {
        let now = Utc::now();
        Document {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            content_type: self.content_type,
            source_url: self.source_url,
            collection_id: self.collection_id,
            processing_status: ProcessingStatus::Queued,
            transcription: None,
            error_message: None,
            media_url: None,
            raw_content_url: None,
            extraction_strategy: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Set-semantics patch applied together with a status change.
///
/// Every field is absolute; applying the same patch twice yields the same
/// record, which keeps duplicate deliveries harmless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_content_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_strategy: Option<ExtractionStrategy>,
    /// Remove a stored `error_message`; ignored when `error_message` is set
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clear_error_message: bool,
}

impl DocumentPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch recording a failure.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn transcription(mut self, text: impl Into<String>) -> Self {
        self.transcription = Some(text.into());
        self
    }

    pub fn media_url(mut self, url: impl Into<String>) -> Self {
        self.media_url = Some(url.into());
        self
    }

    pub fn raw_content_url(mut self, url: impl Into<String>) -> Self {
        self.raw_content_url = Some(url.into());
        self
    }

    pub fn strategy(mut self, strategy: ExtractionStrategy) -> Self {
        self.extraction_strategy = Some(strategy);
        self
    }

    /// Drop the message left by an earlier failed attempt.
    pub fn clear_error_message(mut self) -> Self {
        self.clear_error_message = true;
        self
    }

    /// True when the patch removes the stored error message.
    pub fn clears_error_message(&self) -> bool {
        self.clear_error_message && self.error_message.is_none()
    }

    pub fn is_empty(&self) -> bool {
        *self == DocumentPatch::default()
    }

    /// True when applying the patch would not change `document`.
    pub fn is_satisfied_by(&self, document: &Document) -> bool {
        fn same(patch: &Option<String>, current: Option<&String>) -> bool {
            patch.as_ref().map_or(true, |value| Some(value) == current)
        }

        same(&self.title, Some(&document.title))
            && same(&self.content_type, Some(&document.content_type))
            && same(&self.source_url, document.source_url.as_ref())
            && same(&self.transcription, document.transcription.as_ref())
            && same(&self.error_message, document.error_message.as_ref())
            && same(&self.media_url, document.media_url.as_ref())
            && same(&self.raw_content_url, document.raw_content_url.as_ref())
            && self
                .extraction_strategy
                .map_or(true, |s| Some(s) == document.extraction_strategy)
            && !(self.clears_error_message() && document.error_message.is_some())
    }
}
