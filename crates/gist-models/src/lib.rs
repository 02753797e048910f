//! Shared data models for the Gist ingestion pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs decoded from the source queues
//! - Documents and their processing status lifecycle
//! - Extraction outcomes and strategies
//! - Downstream summary scheduling requests

pub mod document;
pub mod extraction;
pub mod job;
pub mod summary;
pub mod utils;

// Re-export common types
pub use document::{Document, DocumentPatch, NewDocument, ProcessingStatus};
pub use extraction::{ExtractionOutcome, ExtractionStrategy};
pub use job::{Job, ProcessingOptions, SourceType};
pub use summary::{SummaryRequest, SummaryType};
pub use utils::{
    extract_youtube_id, normalize_video_id, youtube_watch_url, YoutubeIdError, YoutubeIdResult,
};
