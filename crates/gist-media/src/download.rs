//! Media download strategies.
//!
//! A [`DownloaderChain`] is assembled from named strategies. Strategies run in
//! the configured order and the first success wins.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::{MediaError, MediaResult};
use crate::ytdlp::YtDlp;

/// Base name of downloaded media files.
const MEDIA_STEM: &str = "media";

/// A downloaded media file.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedMedia {
    pub path: PathBuf,
    pub content_type: String,
    /// Strategy that produced the file
    pub strategy: String,
}

impl DownloadedMedia {
    /// Create from a path, guessing the content type from its extension.
    pub fn from_path(path: PathBuf, strategy: impl Into<String>) -> Self {
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Self {
            path,
            content_type,
            strategy: strategy.into(),
        }
    }

    /// File extension, `bin` when unknown.
    pub fn extension(&self) -> &str {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("bin")
    }
}

/// One way of fetching a video's media.
#[async_trait]
pub trait MediaDownloader: Send + Sync {
    fn name(&self) -> &str;

    async fn download(&self, video_url: &str, output_dir: &Path) -> MediaResult<DownloadedMedia>;
}

/// yt-dlp strategy parameterized by format selector and extra arguments.
pub struct YtDlpDownloader {
    name: String,
    format: String,
    extra_args: Vec<String>,
    ytdlp: YtDlp,
}

impl YtDlpDownloader {
    pub fn new(name: impl Into<String>, format: impl Into<String>, extra_args: Vec<String>, ytdlp: YtDlp) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            extra_args,
            ytdlp,
        }
    }

    /// Built-in strategies keyed by name.
    pub fn defaults(ytdlp: &YtDlp) -> HashMap<String, Arc<dyn MediaDownloader>> {
        let strategies = [
            Self::new("ytdlp-audio", "bestaudio[ext=m4a]/bestaudio", vec![], ytdlp.clone()),
            Self::new(
                "ytdlp-android",
                "bestaudio/best",
                vec![
                    "--extractor-args".to_string(),
                    "youtube:player_client=android".to_string(),
                ],
                ytdlp.clone(),
            ),
            Self::new("ytdlp-lowres", "worst[ext=mp4]/worst", vec![], ytdlp.clone()),
        ];

        strategies
            .into_iter()
            .map(|s| (s.name.clone(), Arc::new(s) as Arc<dyn MediaDownloader>))
            .collect()
    }
}

#[async_trait]
impl MediaDownloader for YtDlpDownloader {
    fn name(&self) -> &str {
        &self.name
    }

    async fn download(&self, video_url: &str, output_dir: &Path) -> MediaResult<DownloadedMedia> {
        tokio::fs::create_dir_all(output_dir).await?;
        let template = output_dir.join(format!("{}.%(ext)s", MEDIA_STEM));

        let mut args = vec![
            "--no-playlist".to_string(),
            "--concurrent-fragments".to_string(),
            "1".to_string(),
            "-f".to_string(),
            self.format.clone(),
        ];
        args.extend(self.extra_args.iter().cloned());
        args.push("-o".to_string());
        args.push(template.to_string_lossy().to_string());
        args.push(video_url.to_string());

        self.ytdlp
            .run(&args)
            .await
            .map_err(|e| match e {
                MediaError::CommandFailed { message, .. } => MediaError::download_failed(message),
                other => other,
            })?;

        let path = find_media_file(output_dir)?
            .ok_or_else(|| MediaError::download_failed("Output file not created"))?;

        Ok(DownloadedMedia::from_path(path, &self.name))
    }
}

fn find_media_file(dir: &Path) -> std::io::Result<Option<PathBuf>> {
    let found = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .find(|path| {
            path.file_stem().and_then(|s| s.to_str()) == Some(MEDIA_STEM)
                && path.extension().and_then(|e| e.to_str()) != Some("part")
        });
    Ok(found)
}

/// Ordered list of download strategies.
pub struct DownloaderChain {
    strategies: Vec<Arc<dyn MediaDownloader>>,
}

impl DownloaderChain {
    pub fn new(strategies: Vec<Arc<dyn MediaDownloader>>) -> Self {
        Self { strategies }
    }

    /// Select strategies from `registry` in `order`.
    pub fn from_registry(
        registry: &HashMap<String, Arc<dyn MediaDownloader>>,
        order: &[String],
    ) -> MediaResult<Self> {
        let strategies = order
            .iter()
            .map(|name| {
                registry
                    .get(name)
                    .cloned()
                    .ok_or_else(|| MediaError::UnknownStrategy(name.clone()))
            })
            .collect::<MediaResult<Vec<_>>>()?;

        Ok(Self::new(strategies))
    }

    pub fn names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order. Each gets its own subdirectory so a
    /// partial file from a failed attempt never masks a later one.
    pub async fn download(&self, video_url: &str, output_dir: &Path) -> MediaResult<DownloadedMedia> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let dir = output_dir.join(strategy.name());
            match strategy.download(video_url, &dir).await {
                Ok(media) => {
                    info!(
                        strategy = %strategy.name(),
                        path = %media.path.display(),
                        "Downloaded media"
                    );
                    return Ok(media);
                }
                Err(MediaError::YtDlpNotFound) => return Err(MediaError::YtDlpNotFound),
                Err(e) => {
                    warn!(strategy = %strategy.name(), "Download strategy failed: {}", e);
                    failures.push((strategy.name().to_string(), e.to_string()));
                }
            }
        }

        Err(MediaError::AllStrategiesFailed(failures))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FakeDownloader {
        name: String,
        succeed: bool,
        calls: AtomicUsize,
    }

    impl FakeDownloader {
        fn new(name: &str, succeed: bool) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                succeed,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl MediaDownloader for FakeDownloader {
        fn name(&self) -> &str {
            &self.name
        }

        async fn download(&self, _video_url: &str, output_dir: &Path) -> MediaResult<DownloadedMedia> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.succeed {
                return Err(MediaError::download_failed(format!("{} refused", self.name)));
            }
            tokio::fs::create_dir_all(output_dir).await?;
            let path = output_dir.join("media.m4a");
            tokio::fs::write(&path, b"audio").await?;
            Ok(DownloadedMedia::from_path(path, &self.name))
        }
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let dir = tempfile::tempdir().unwrap();
        let failing = FakeDownloader::new("a", false);
        let working = FakeDownloader::new("b", true);
        let unused = FakeDownloader::new("c", true);

        let chain = DownloaderChain::new(vec![
            failing.clone() as Arc<dyn MediaDownloader>,
            working.clone(),
            unused.clone(),
        ]);
        let media = chain.download("https://youtu.be/x", dir.path()).await.unwrap();

        assert_eq!(media.strategy, "b");
        assert_eq!(media.extension(), "m4a");
        assert!(media.content_type.starts_with("audio/"));
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(unused.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_failures_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let chain = DownloaderChain::new(vec![
            FakeDownloader::new("a", false) as Arc<dyn MediaDownloader>,
            FakeDownloader::new("b", false),
        ]);

        let err = chain.download("u", dir.path()).await.unwrap_err();
        match err {
            MediaError::AllStrategiesFailed(failures) => {
                let names: Vec<_> = failures.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["a", "b"]);
                assert!(failures[1].1.contains("b refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_registry_order_and_unknown_names() {
        let ytdlp = YtDlp::new(&crate::config::MediaConfig::default());
        let registry = YtDlpDownloader::defaults(&ytdlp);

        let order = vec!["ytdlp-lowres".to_string(), "ytdlp-audio".to_string()];
        let chain = DownloaderChain::from_registry(&registry, &order).unwrap();
        assert_eq!(chain.names(), vec!["ytdlp-lowres", "ytdlp-audio"]);

        let bad = vec!["ftp".to_string()];
        assert!(matches!(
            DownloaderChain::from_registry(&registry, &bad),
            Err(MediaError::UnknownStrategy(name)) if name == "ftp"
        ));
    }

    #[test]
    fn test_find_media_file_ignores_partial() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("media.webm.part"), b"x").unwrap();
        assert!(find_media_file(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join("media.webm"), b"x").unwrap();
        assert!(find_media_file(dir.path()).unwrap().unwrap().ends_with("media.webm"));
    }
}
