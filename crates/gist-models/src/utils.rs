//! Utility functions for URL parsing and validation.

use thiserror::Error;
use url::Url;

/// Errors that can occur during YouTube ID extraction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum YoutubeIdError {
    #[error("URL is not a valid YouTube URL")]
    InvalidYoutubeUrl,
    #[error("Video ID has invalid format")]
    InvalidVideoId,
    #[error("Video ID not found in URL")]
    VideoIdNotFound,
}

/// Result type for YouTube ID extraction.
pub type YoutubeIdResult<T> = Result<T, YoutubeIdError>;

/// Path prefixes that are followed directly by a video id.
const ID_PATH_PREFIXES: [&str; 4] = ["embed", "v", "shorts", "live"];

/// Extract the 11-character YouTube video ID from a URL.
///
/// Supports `watch?v=`, `youtu.be/`, `/embed/`, `/v/`, `/shorts/` and
/// `/live/` forms, with or without extra query parameters or fragments.
pub fn extract_youtube_id(url: &str) -> YoutubeIdResult<String> {
    let url = url.trim();
    let with_scheme = if url.contains("://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };

    let parsed = Url::parse(&with_scheme).map_err(|_| YoutubeIdError::InvalidYoutubeUrl)?;
    let host = parsed
        .host_str()
        .map(|h| h.to_ascii_lowercase())
        .ok_or(YoutubeIdError::InvalidYoutubeUrl)?;

    let is_short_host = host == "youtu.be";
    let is_youtube_host = host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host == "youtube-nocookie.com"
        || host.ends_with(".youtube-nocookie.com");

    if !is_short_host && !is_youtube_host {
        return Err(YoutubeIdError::InvalidYoutubeUrl);
    }

    let mut segments = parsed
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect::<Vec<_>>())
        .unwrap_or_default()
        .into_iter();

    if is_short_host {
        return match segments.next() {
            Some(id) => validate_youtube_id(id),
            None => Err(YoutubeIdError::VideoIdNotFound),
        };
    }

    if let Some((_, id)) = parsed.query_pairs().find(|(key, _)| key == "v") {
        return validate_youtube_id(&id);
    }

    match (segments.next(), segments.next()) {
        (Some(prefix), Some(id)) if ID_PATH_PREFIXES.contains(&prefix) => validate_youtube_id(id),
        _ => Err(YoutubeIdError::VideoIdNotFound),
    }
}

/// Normalize a queue-supplied video reference to a bare video id.
///
/// Accepts either a bare id or any URL understood by [`extract_youtube_id`].
pub fn normalize_video_id(reference: &str) -> YoutubeIdResult<String> {
    let reference = reference.trim();
    if is_valid_youtube_id(reference) {
        return Ok(reference.to_string());
    }
    extract_youtube_id(reference)
}

/// Canonical watch URL for a video id.
pub fn youtube_watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

fn is_valid_youtube_id(id: &str) -> bool {
    id.len() == 11 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn validate_youtube_id(id: &str) -> YoutubeIdResult<String> {
    if is_valid_youtube_id(id) {
        Ok(id.to_string())
    } else {
        Err(YoutubeIdError::InvalidVideoId)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_youtube_id_success_cases() {
        let cases = [
            "https://youtube.com/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ?t=30",
            "https://youtube.com/embed/dQw4w9WgXcQ",
            "https://youtube.com/v/dQw4w9WgXcQ",
            "https://youtube.com/shorts/dQw4w9WgXcQ",
            "https://youtube.com/watch?v=dQw4w9WgXcQ&list=PLrAXtmRdnEQy4qtr",
            "youtube.com/watch?v=dQw4w9WgXcQ",
        ];

        for case in cases {
            assert_eq!(extract_youtube_id(case).unwrap(), "dQw4w9WgXcQ", "{}", case);
        }
    }

    #[test]
    fn test_extract_youtube_id_error_cases() {
        assert_eq!(
            extract_youtube_id("https://example.com"),
            Err(YoutubeIdError::InvalidYoutubeUrl)
        );
        assert_eq!(
            extract_youtube_id("https://vimeo.com/123"),
            Err(YoutubeIdError::InvalidYoutubeUrl)
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com"),
            Err(YoutubeIdError::VideoIdNotFound)
        );
        assert_eq!(
            extract_youtube_id("https://youtu.be/"),
            Err(YoutubeIdError::VideoIdNotFound)
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com/watch?v=abc123"),
            Err(YoutubeIdError::InvalidVideoId)
        );
        assert_eq!(
            extract_youtube_id("https://youtube.com/watch?v="),
            Err(YoutubeIdError::InvalidVideoId)
        );
    }

    #[test]
    fn test_normalize_video_id() {
        assert_eq!(normalize_video_id("dQw4w9WgXcQ").unwrap(), "dQw4w9WgXcQ");
        assert_eq!(
            normalize_video_id(" https://youtu.be/dQw4w9WgXcQ ").unwrap(),
            "dQw4w9WgXcQ"
        );
        assert!(normalize_video_id("not a video").is_err());
    }

    #[test]
    fn test_youtube_watch_url() {
        assert_eq!(
            youtube_watch_url("dQw4w9WgXcQ"),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }
}
