//! Shared fakes for worker scenario tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify};

use gist_extract::{DocumentExtractor, DocumentExtractorConfig, WebsiteConfig, WebsiteExtractor, WebsiteFetcher};
use gist_firestore::InMemoryStatusRepository;
use gist_media::{DownloadedMedia, DownloaderChain, MediaDownloader, MediaError, MediaResult, VideoInfoProvider, VideoMetadata};
use gist_models::{Document, Job, NewDocument};
use gist_queue::{InMemoryQueue, QueueClient, QueueNames};
use gist_storage::{InMemoryStore, ObjectStore, StorageError, StorageResult};
use gist_worker::{
    BestEffortScheduler, DocumentProcessor, JobHandler, JobOutcome, ProcessorRouter, ScheduleOutcome,
    SummaryScheduler, VideoProcessor, WebsiteProcessor, Worker, WorkerConfig, WorkerResult,
};

pub const MEDIA_BUCKET: &str = "media";
pub const DOCUMENTS_BUCKET: &str = "documents";
pub const ARTIFACTS_BUCKET: &str = "artifacts";

/// Video provider with canned answers.
pub struct FakeInfoProvider {
    pub metadata: Option<VideoMetadata>,
    pub captions: Option<String>,
}

impl FakeInfoProvider {
    pub fn found(video_id: &str, captions: Option<&str>) -> Self {
        Self {
            metadata: Some(VideoMetadata {
                video_id: video_id.to_string(),
                title: "Rust in Production".to_string(),
                author: "Conf Channel".to_string(),
                duration_secs: Some(754),
                description: "A talk about running Rust services.".to_string(),
                webpage_url: format!("https://www.youtube.com/watch?v={}", video_id),
            }),
            captions: captions.map(str::to_string),
        }
    }

    pub fn missing() -> Self {
        Self {
            metadata: None,
            captions: None,
        }
    }
}

#[async_trait]
impl VideoInfoProvider for FakeInfoProvider {
    async fn fetch_metadata(&self, video_id: &str) -> MediaResult<VideoMetadata> {
        self.metadata
            .clone()
            .ok_or_else(|| MediaError::video_not_found(format!("{}: private video", video_id)))
    }

    async fn fetch_captions(&self, _video_id: &str, _workdir: &Path) -> MediaResult<Option<String>> {
        Ok(self.captions.clone())
    }
}

/// Downloader that writes a small audio file.
pub struct FakeDownloader;

#[async_trait]
impl MediaDownloader for FakeDownloader {
    fn name(&self) -> &str {
        "fake"
    }

    async fn download(&self, _video_url: &str, output_dir: &Path) -> MediaResult<DownloadedMedia> {
        tokio::fs::create_dir_all(output_dir).await?;
        let path = output_dir.join("media.m4a");
        tokio::fs::write(&path, b"fake audio").await?;
        Ok(DownloadedMedia::from_path(path, "fake"))
    }
}

/// Object store whose uploads always fail.
pub struct FailingUploadStore;

#[async_trait]
impl ObjectStore for FailingUploadStore {
    fn bucket(&self) -> &str {
        ARTIFACTS_BUCKET
    }

    fn for_bucket(&self, _bucket: &str) -> Arc<dyn ObjectStore> {
        Arc::new(FailingUploadStore)
    }

    async fn upload_file(&self, _path: &Path, _key: &str, _content_type: &str) -> StorageResult<String> {
        Err(StorageError::upload_failed("network timeout"))
    }

    async fn upload_bytes(&self, _data: Vec<u8>, _key: &str, _content_type: &str) -> StorageResult<String> {
        Err(StorageError::upload_failed("network timeout"))
    }

    async fn download_bytes(&self, key: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::not_found(key))
    }

    async fn download_file(&self, key: &str, _path: &Path) -> StorageResult<PathBuf> {
        Err(StorageError::not_found(key))
    }
}

/// Records every summary request it is asked to schedule.
#[derive(Default)]
pub struct RecordingScheduler {
    pub calls: AtomicUsize,
}

#[async_trait]
impl SummaryScheduler for RecordingScheduler {
    async fn schedule_summary(&self, _request: gist_models::SummaryRequest, _delay_minutes: u32) -> WorkerResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn test_config(work_dir: &Path) -> WorkerConfig {
    WorkerConfig {
        poll_interval: Duration::from_millis(10),
        error_backoff: Duration::from_millis(10),
        work_dir: work_dir.to_path_buf(),
        media_bucket: MEDIA_BUCKET.to_string(),
        documents_bucket: DOCUMENTS_BUCKET.to_string(),
        artifacts_bucket: ARTIFACTS_BUCKET.to_string(),
        ..Default::default()
    }
}

/// Worker wired to in-memory collaborators.
pub struct Harness {
    pub queue: Arc<InMemoryQueue>,
    pub names: QueueNames,
    pub store: InMemoryStore,
    pub status: Arc<InMemoryStatusRepository>,
    pub scheduler: Arc<RecordingScheduler>,
    pub outcomes: mpsc::UnboundedReceiver<ScheduleOutcome>,
    pub worker: Worker,
    pub work_dir: TempDir,
}

impl Harness {
    pub fn new(info: FakeInfoProvider) -> Self {
        Self::build(info, None)
    }

    /// Harness whose website archive goes to `artifacts` instead of the shared store.
    pub fn with_artifacts(info: FakeInfoProvider, artifacts: Arc<dyn ObjectStore>) -> Self {
        Self::build(info, Some(artifacts))
    }

    fn build(info: FakeInfoProvider, artifacts: Option<Arc<dyn ObjectStore>>) -> Self {
        let work_dir = tempfile::tempdir().unwrap();
        let config = test_config(work_dir.path());

        let queue = Arc::new(InMemoryQueue::default());
        let names = QueueNames::default();
        let store = InMemoryStore::new();
        let status = Arc::new(InMemoryStatusRepository::new());
        let recording = Arc::new(RecordingScheduler::default());
        let (scheduler, outcomes) =
            BestEffortScheduler::new(Some(recording.clone() as Arc<dyn SummaryScheduler>), 0);

        let artifacts = artifacts.unwrap_or_else(|| store.for_bucket(ARTIFACTS_BUCKET));
        let website = WebsiteExtractor::new(WebsiteFetcher::new(&WebsiteConfig::default()).unwrap(), None);

        let router = ProcessorRouter::new(
            status.clone(),
            scheduler,
            Arc::new(VideoProcessor::new(
                Arc::new(info),
                Arc::new(DownloaderChain::new(vec![Arc::new(FakeDownloader) as Arc<dyn MediaDownloader>])),
                store.for_bucket(MEDIA_BUCKET),
                config.work_dir.clone(),
            )),
            Arc::new(WebsiteProcessor::new(Arc::new(website), artifacts)),
            Arc::new(DocumentProcessor::new(
                Arc::new(DocumentExtractor::new(DocumentExtractorConfig::default())),
                store.for_bucket(DOCUMENTS_BUCKET),
                config.work_dir.clone(),
            )),
        );

        let worker = Worker::new(queue.clone(), names.clone(), Arc::new(router), status.clone(), config);

        Self {
            queue,
            names,
            store,
            status,
            scheduler: recording,
            outcomes,
            worker,
            work_dir,
        }
    }

    /// Seed a queued document.
    pub fn seed_document(&self, id: &str, content_type: &str) {
        self.status.insert(document(id, content_type));
    }

    pub async fn enqueue(&self, queue: &str, body: serde_json::Value) -> String {
        self.queue.send(queue, &body.to_string()).await.unwrap()
    }
}

pub fn document(id: &str, content_type: &str) -> Document {
    let mut new = NewDocument::new("user-1", "Untitled", content_type);
    new.id = id.to_string();
    new.into_document()
}

/// Handler that blocks until released, tracking concurrency.
#[derive(Default)]
pub struct GatedHandler {
    pub calls: AtomicUsize,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl JobHandler for GatedHandler {
    async fn handle(&self, _job: &Job, _document_id: &str) -> WorkerResult<JobOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        self.entered.notify_one();
        self.release.notified().await;

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(JobOutcome::Skipped)
    }
}

/// Poll `condition` until it holds or two seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
