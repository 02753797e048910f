//! yt-dlp process runner.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::config::MediaConfig;
use crate::cookies::CookieFile;
use crate::error::{MediaError, MediaResult};

/// Shared yt-dlp invocation settings.
#[derive(Debug, Clone)]
pub struct YtDlp {
    binary: String,
    timeout: Duration,
    cookies: Arc<CookieFile>,
}

impl YtDlp {
    pub fn new(config: &MediaConfig) -> Self {
        Self {
            binary: config.ytdlp_binary.clone(),
            timeout: config.timeout,
            cookies: Arc::new(CookieFile::new(
                config.cookies_path.clone(),
                config.writable_cookies_path.clone(),
            )),
        }
    }

    /// Resolve the executable, failing with `YtDlpNotFound` when absent.
    pub fn resolve(&self) -> MediaResult<PathBuf> {
        which::which(&self.binary).map_err(|_| MediaError::YtDlpNotFound)
    }

    /// Run yt-dlp with `args`, adding `--cookies` when configured.
    ///
    /// Returns the raw output; a non-zero exit is mapped to
    /// `CommandFailed` carrying the last stderr line.
    pub async fn run(&self, args: &[String]) -> MediaResult<Output> {
        let binary = self.resolve()?;

        let mut command = Command::new(binary);
        if let Some(cookies) = self.cookies.path().await {
            command.arg("--cookies").arg(cookies);
        }
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(args = ?args, "Running yt-dlp");

        let output = tokio::time::timeout(self.timeout, command.output())
            .await
            .map_err(|_| MediaError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).to_string();
            debug!("yt-dlp stderr: {}", stderr);
            let last_line = stderr
                .lines()
                .rev()
                .find(|l| !l.trim().is_empty())
                .unwrap_or("Unknown error")
                .to_string();
            return Err(MediaError::command_failed(last_line, Some(stderr)));
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary() {
        let config = MediaConfig {
            ytdlp_binary: "gist-test-no-such-ytdlp-binary".to_string(),
            ..Default::default()
        };
        let ytdlp = YtDlp::new(&config);
        assert!(matches!(ytdlp.resolve(), Err(MediaError::YtDlpNotFound)));
        assert!(matches!(
            ytdlp.run(&["--version".to_string()]).await,
            Err(MediaError::YtDlpNotFound)
        ));
    }
}
