//! Video processing: metadata, native captions, media fallback.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use gist_media::{DownloaderChain, VideoInfoProvider, VideoMetadata};
use gist_models::{normalize_video_id, DocumentPatch, ExtractionStrategy, Job, ProcessingStatus};
use gist_storage::{keys, ObjectStore};

use super::{job_workdir, Extracted, SourceProcessor};
use crate::error::{WorkerError, WorkerResult};

/// Turns a video reference into a transcript.
///
/// Native captions are used when the video has them. Otherwise the media is
/// downloaded and archived, and the transcript is a placeholder built from
/// the metadata; no speech-to-text happens here.
pub struct VideoProcessor {
    info: Arc<dyn VideoInfoProvider>,
    downloader: Arc<DownloaderChain>,
    media: Arc<dyn ObjectStore>,
    work_dir: PathBuf,
}

impl VideoProcessor {
    /// `media` must already be bound to the media bucket.
    pub fn new(
        info: Arc<dyn VideoInfoProvider>,
        downloader: Arc<DownloaderChain>,
        media: Arc<dyn ObjectStore>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            info,
            downloader,
            media,
            work_dir: work_dir.into(),
        }
    }
}

#[async_trait]
impl SourceProcessor for VideoProcessor {
    async fn process(&self, job: &Job, _document_id: &str) -> WorkerResult<Extracted> {
        let video_id = normalize_video_id(&job.source_id)?;

        let metadata = self
            .info
            .fetch_metadata(&video_id)
            .await
            .map_err(|e| WorkerError::video_not_found(format!("{}: {}", video_id, e)))?;

        info!(
            video_id = %video_id,
            title = %metadata.title,
            duration = %metadata.duration_label(),
            "Fetched video metadata"
        );

        let workdir = job_workdir(&self.work_dir, &format!("video-{}-", video_id)).await?;

        let captions = match self.info.fetch_captions(&video_id, workdir.path()).await {
            Ok(captions) => captions.filter(|c| !c.trim().is_empty()),
            Err(e) => {
                warn!(video_id = %video_id, "Caption lookup failed, falling back to media: {}", e);
                None
            }
        };

        let patch = DocumentPatch::new()
            .title(metadata.title.clone())
            .source_url(metadata.webpage_url.clone());

        if let Some(transcript) = captions {
            info!(video_id = %video_id, chars = transcript.len(), "Using native captions");
            return Ok(Extracted::new(
                ProcessingStatus::Transcribed,
                patch,
                transcript,
                ExtractionStrategy::NativeCaptions,
            ));
        }

        let media = self
            .downloader
            .download(&metadata.webpage_url, workdir.path())
            .await?;

        let key = keys::media_key(&job.user_id, &video_id, media.extension());
        let media_url = self
            .media
            .upload_file(&media.path, &key, &media.content_type)
            .await?;

        info!(
            video_id = %video_id,
            strategy = %media.strategy,
            key = %key,
            "Archived video media"
        );

        Ok(Extracted::new(
            ProcessingStatus::Transcribed,
            patch.media_url(media_url),
            placeholder_transcript(&metadata),
            ExtractionStrategy::PlaceholderTranscript,
        )
        .with_diagnostic(Some("No native captions; transcript is a metadata placeholder".to_string())))
    }
}

/// Stand-in transcript for videos without captions.
pub fn placeholder_transcript(metadata: &VideoMetadata) -> String {
    let mut text = format!(
        "Title: {}\nChannel: {}\nDuration: {}\nSource: {}\n",
        metadata.title,
        metadata.author,
        metadata.duration_label(),
        metadata.webpage_url
    );

    let description = metadata.description.trim();
    if !description.is_empty() {
        text.push('\n');
        text.push_str(description);
        text.push('\n');
    }

    text.push_str(
        "\n[No captions were available for this video. The media has been archived; \
         this transcript only reflects the video's metadata.]",
    );
    text
}
