//! Netscape cookie file handling for yt-dlp.
//!
//! yt-dlp writes cookies back after each run, so the configured (often
//! read-only) file is validated once and copied to a writable location.

use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Minimum size for a valid cookies file (bytes).
const MIN_COOKIES_FILE_SIZE: u64 = 50;

/// Validate that a cookies file appears to be in Netscape format.
///
/// Accepts the standard header, or any line with at least six
/// tab-separated fields.
pub fn is_valid_netscape_cookies(content: &str) -> bool {
    if content.starts_with("# Netscape HTTP Cookie File") || content.starts_with("# HTTP Cookie File") {
        return true;
    }

    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .any(|line| line.split('\t').count() >= 6)
}

/// Lazily prepared writable copy of a cookies file.
#[derive(Debug)]
pub struct CookieFile {
    source: Option<PathBuf>,
    writable: PathBuf,
    copied: Mutex<bool>,
}

impl CookieFile {
    pub fn new(source: Option<PathBuf>, writable: PathBuf) -> Self {
        Self {
            source,
            writable,
            copied: Mutex::new(false),
        }
    }

    /// No cookies configured.
    pub fn none() -> Self {
        Self::new(None, PathBuf::new())
    }

    /// Path to pass to `--cookies`, or `None` when no usable file exists.
    pub async fn path(&self) -> Option<PathBuf> {
        let source = self.source.as_deref()?;

        if !Self::validate(source).await {
            return None;
        }

        let mut copied = self.copied.lock().await;
        if !*copied || !self.writable.exists() {
            if let Err(e) = tokio::fs::copy(source, &self.writable).await {
                warn!("Failed to copy cookies file to {}: {}", self.writable.display(), e);
                return None;
            }
            debug!("Copied cookies file to writable location: {}", self.writable.display());
            *copied = true;
            info!("Using cookies file for yt-dlp authentication");
        }

        Some(self.writable.clone())
    }

    async fn validate(source: &Path) -> bool {
        match tokio::fs::metadata(source).await {
            Ok(metadata) if metadata.len() < MIN_COOKIES_FILE_SIZE => {
                debug!(
                    "Cookies file {} is too small ({} bytes), skipping",
                    source.display(),
                    metadata.len()
                );
                return false;
            }
            Ok(_) => {}
            Err(e) => {
                debug!("Cookies file {} unavailable: {}", source.display(), e);
                return false;
            }
        }

        match tokio::fs::read_to_string(source).await {
            Ok(content) if is_valid_netscape_cookies(&content) => true,
            Ok(_) => {
                debug!("Cookies file {} is not in Netscape format, skipping", source.display());
                false
            }
            Err(e) => {
                warn!("Failed to read cookies file: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COOKIE_LINE: &str = ".youtube.com\tTRUE\t/\tTRUE\t1999999999\tPREF\tf6=40000000&hl=en";

    #[test]
    fn test_netscape_validation() {
        assert!(is_valid_netscape_cookies("# Netscape HTTP Cookie File\n"));
        assert!(is_valid_netscape_cookies(&format!("# comment\n\n{}\n", COOKIE_LINE)));
        assert!(!is_valid_netscape_cookies("{\"cookies\": []}"));
        assert!(!is_valid_netscape_cookies(""));
    }

    #[tokio::test]
    async fn test_valid_file_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("cookies.txt");
        let writable = dir.path().join("writable.txt");
        tokio::fs::write(&source, format!("# Netscape HTTP Cookie File\n{}\n", COOKIE_LINE))
            .await
            .unwrap();

        let cookies = CookieFile::new(Some(source), writable.clone());
        assert_eq!(cookies.path().await, Some(writable.clone()));
        assert!(writable.exists());
    }

    #[tokio::test]
    async fn test_invalid_or_missing_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let tiny = dir.path().join("tiny.txt");
        tokio::fs::write(&tiny, "x").await.unwrap();

        let cookies = CookieFile::new(Some(tiny), dir.path().join("w.txt"));
        assert!(cookies.path().await.is_none());

        let missing = CookieFile::new(Some(dir.path().join("nope.txt")), dir.path().join("w.txt"));
        assert!(missing.path().await.is_none());

        assert!(CookieFile::none().path().await.is_none());
    }
}
