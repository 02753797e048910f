//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Video not found: {0}")]
    VideoNotFound(String),

    #[error("Scheduling failed: {0}")]
    ScheduleFailed(String),

    #[error("Invalid video reference: {0}")]
    VideoId(#[from] gist_models::YoutubeIdError),

    #[error("Queue error: {0}")]
    Queue(#[from] gist_queue::QueueError),

    #[error("Storage error: {0}")]
    Storage(#[from] gist_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] gist_firestore::FirestoreError),

    #[error("Media error: {0}")]
    Media(#[from] gist_media::MediaError),

    #[error("Extraction failed: {0}")]
    Extract(#[from] gist_extract::ExtractError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn video_not_found(msg: impl Into<String>) -> Self {
        Self::VideoNotFound(msg.into())
    }

    pub fn schedule_failed(msg: impl Into<String>) -> Self {
        Self::ScheduleFailed(msg.into())
    }

    /// Message stored on the document when the job fails.
    pub fn user_message(&self) -> String {
        match self {
            WorkerError::Extract(e) => e.to_string(),
            WorkerError::Media(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}
