//! Error types for media operations.

use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur while talking to yt-dlp.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("yt-dlp not found in PATH")]
    YtDlpNotFound,

    #[error("Video not found or unavailable: {0}")]
    VideoNotFound(String),

    #[error("yt-dlp command failed: {message}")]
    CommandFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("Download failed: {message}")]
    DownloadFailed { message: String },

    #[error("All download strategies failed: {}", format_failures(.0))]
    AllStrategiesFailed(Vec<(String, String)>),

    #[error("Unknown download strategy: {0}")]
    UnknownStrategy(String),

    #[error("Invalid video id: {0}")]
    InvalidVideoId(String),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

fn format_failures(failures: &[(String, String)]) -> String {
    if failures.is_empty() {
        return "no strategies configured".to_string();
    }
    failures
        .iter()
        .map(|(name, reason)| format!("{}: {}", name, reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl MediaError {
    pub fn command_failed(message: impl Into<String>, stderr: Option<String>) -> Self {
        Self::CommandFailed {
            message: message.into(),
            stderr,
        }
    }

    pub fn download_failed(message: impl Into<String>) -> Self {
        Self::DownloadFailed {
            message: message.into(),
        }
    }

    pub fn video_not_found(message: impl Into<String>) -> Self {
        Self::VideoNotFound(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_strategies_failed_lists_each() {
        let err = MediaError::AllStrategiesFailed(vec![
            ("ytdlp-audio".into(), "HTTP 403".into()),
            ("ytdlp-lowres".into(), "timed out".into()),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("ytdlp-audio: HTTP 403"));
        assert!(msg.contains("ytdlp-lowres: timed out"));
    }

    #[test]
    fn test_video_not_found_message() {
        let err = MediaError::video_not_found("private video");
        assert!(err.to_string().contains("not found"));
    }
}
