//! Video metadata and native caption lookup.

use std::path::Path;

use async_trait::async_trait;
use tracing::{info, warn};

use gist_models::youtube_watch_url;

use crate::captions::{find_caption_file, parse_vtt};
use crate::error::{MediaError, MediaResult};
use crate::metadata::VideoMetadata;
use crate::ytdlp::YtDlp;

/// Source of video metadata and captions.
#[async_trait]
pub trait VideoInfoProvider: Send + Sync {
    /// Fetch metadata. A missing or private video is `VideoNotFound`.
    async fn fetch_metadata(&self, video_id: &str) -> MediaResult<VideoMetadata>;

    /// Fetch native captions as a timestamped transcript, `None` when the
    /// video has none.
    async fn fetch_captions(&self, video_id: &str, workdir: &Path) -> MediaResult<Option<String>>;
}

/// yt-dlp backed provider.
pub struct YtDlpInfoProvider {
    ytdlp: YtDlp,
}

impl YtDlpInfoProvider {
    pub fn new(ytdlp: YtDlp) -> Self {
        Self { ytdlp }
    }
}

#[async_trait]
impl VideoInfoProvider for YtDlpInfoProvider {
    async fn fetch_metadata(&self, video_id: &str) -> MediaResult<VideoMetadata> {
        let args = vec![
            "--dump-json".to_string(),
            "--skip-download".to_string(),
            "--no-playlist".to_string(),
            youtube_watch_url(video_id),
        ];

        let output = match self.ytdlp.run(&args).await {
            Ok(output) => output,
            Err(MediaError::CommandFailed { message, .. }) => {
                return Err(MediaError::video_not_found(format!("{}: {}", video_id, message)));
            }
            Err(e) => return Err(e),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let metadata = VideoMetadata::from_dump_json(video_id, stdout.trim())?;

        info!(video_id = %video_id, title = %metadata.title, "Fetched video metadata");
        Ok(metadata)
    }

    async fn fetch_captions(&self, video_id: &str, workdir: &Path) -> MediaResult<Option<String>> {
        let caption_dir = workdir.join("captions");
        tokio::fs::create_dir_all(&caption_dir).await?;

        let output_template = caption_dir.join("%(id)s");
        let args = vec![
            "--write-auto-sub".to_string(),
            "--write-sub".to_string(),
            "--sub-lang".to_string(),
            "en,en-US,en-GB".to_string(),
            "--skip-download".to_string(),
            "--sub-format".to_string(),
            "vtt".to_string(),
            "--output".to_string(),
            output_template.to_string_lossy().to_string(),
            youtube_watch_url(video_id),
        ];

        match self.ytdlp.run(&args).await {
            Ok(_) => {}
            Err(MediaError::CommandFailed { message, .. }) => {
                warn!(video_id = %video_id, "Caption download failed: {}", message);
                return Ok(None);
            }
            Err(e) => return Err(e),
        }

        let Some(vtt_path) = find_caption_file(&caption_dir)? else {
            info!(video_id = %video_id, "No native captions available");
            return Ok(None);
        };

        let content = tokio::fs::read_to_string(&vtt_path).await?;
        let transcript = parse_vtt(&content);

        if transcript.trim().is_empty() {
            return Ok(None);
        }

        info!(
            video_id = %video_id,
            lines = transcript.lines().count(),
            "Parsed native captions"
        );
        Ok(Some(transcript))
    }
}
