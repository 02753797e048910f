//! Media configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default order of download strategies.
pub const DEFAULT_STRATEGIES: [&str; 3] = ["ytdlp-audio", "ytdlp-android", "ytdlp-lowres"];

/// Configuration for yt-dlp invocations.
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// yt-dlp executable name or path
    pub ytdlp_binary: String,
    /// Source Netscape cookies file, if any
    pub cookies_path: Option<PathBuf>,
    /// Writable copy handed to yt-dlp (it saves cookies back)
    pub writable_cookies_path: PathBuf,
    /// Download strategy names, in the order they are tried
    pub download_strategies: Vec<String>,
    /// Per-invocation timeout
    pub timeout: Duration,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ytdlp_binary: "yt-dlp".to_string(),
            cookies_path: None,
            writable_cookies_path: std::env::temp_dir().join("gist-ytdlp-cookies.txt"),
            download_strategies: DEFAULT_STRATEGIES.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(600),
        }
    }
}

impl MediaConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let download_strategies = std::env::var("MEDIA_DOWNLOAD_STRATEGIES")
            .ok()
            .map(|s| parse_strategy_list(&s))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.download_strategies);

        Self {
            ytdlp_binary: std::env::var("YTDLP_BINARY").unwrap_or(defaults.ytdlp_binary),
            cookies_path: std::env::var("YTDLP_COOKIES_PATH")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            writable_cookies_path: std::env::var("YTDLP_WRITABLE_COOKIES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.writable_cookies_path),
            download_strategies,
            timeout: Duration::from_secs(
                std::env::var("YTDLP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}

fn parse_strategy_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_parse_strategy_list() {
        assert_eq!(
            parse_strategy_list(" ytdlp-lowres, ytdlp-audio ,,"),
            vec!["ytdlp-lowres", "ytdlp-audio"]
        );
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::remove_var("MEDIA_DOWNLOAD_STRATEGIES");
        std::env::remove_var("YTDLP_COOKIES_PATH");
        std::env::set_var("YTDLP_TIMEOUT_SECS", "30");

        let config = MediaConfig::from_env();
        assert_eq!(config.download_strategies, DEFAULT_STRATEGIES.to_vec());
        assert!(config.cookies_path.is_none());
        assert_eq!(config.timeout, Duration::from_secs(30));

        std::env::set_var("MEDIA_DOWNLOAD_STRATEGIES", "ytdlp-android");
        std::env::set_var("YTDLP_COOKIES_PATH", "/secrets/cookies.txt");
        let config = MediaConfig::from_env();
        assert_eq!(config.download_strategies, vec!["ytdlp-android"]);
        assert_eq!(config.cookies_path, Some(PathBuf::from("/secrets/cookies.txt")));

        for var in ["MEDIA_DOWNLOAD_STRATEGIES", "YTDLP_COOKIES_PATH", "YTDLP_TIMEOUT_SECS"] {
            std::env::remove_var(var);
        }
    }
}
