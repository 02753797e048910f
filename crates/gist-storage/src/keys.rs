//! Object key layout.
//!
//! Keys are deterministic so reprocessing the same source overwrites the
//! previous artifact instead of leaving orphans behind.

/// Downloaded media for a video.
///
/// Format: `{user_id}/videos/{video_id}/media.{ext}`
pub fn media_key(user_id: &str, video_id: &str, ext: &str) -> String {
    format!("{}/videos/{}/media.{}", user_id, video_id, ext.trim_start_matches('.'))
}

/// Gzipped raw HTML of a website scrape.
///
/// Format: `{user_id}/websites/{document_id}/raw.html.gz`
pub fn raw_scrape_key(user_id: &str, document_id: &str) -> String {
    format!("{}/websites/{}/raw.html.gz", user_id, document_id)
}

/// Default location of an uploaded document.
///
/// Format: `{user_id}/documents/{document_id}`
pub fn document_key(user_id: &str, document_id: &str) -> String {
    format!("{}/documents/{}", user_id, document_id)
}
