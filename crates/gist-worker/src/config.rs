//! Worker configuration.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Clone)]
pub struct WorkerConfig {
    /// Sleep after each full pass over the queues
    pub poll_interval: Duration,
    /// Sleep after a pass that hit an unexpected error
    pub error_backoff: Duration,
    /// Work directory for temporary files
    pub work_dir: PathBuf,
    /// Bucket for downloaded video media
    pub media_bucket: String,
    /// Bucket holding uploaded documents
    pub documents_bucket: String,
    /// Bucket for scrape artifacts
    pub artifacts_bucket: String,
    /// Events endpoint for summary scheduling; scheduling is off when unset
    pub summary_events_url: Option<String>,
    /// Bearer key for the events endpoint
    pub summary_event_key: Option<String>,
    /// Delay attached to scheduled summaries
    pub summary_delay_minutes: u32,
    /// Prometheus listener address; metrics export is off when unset
    pub metrics_addr: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(5),
            work_dir: PathBuf::from("/tmp/gist"),
            media_bucket: "gist-media".to_string(),
            documents_bucket: "gist-documents".to_string(),
            artifacts_bucket: "gist-artifacts".to_string(),
            summary_events_url: None,
            summary_event_key: None,
            summary_delay_minutes: 0,
            metrics_addr: None,
        }
    }
}

impl fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("poll_interval", &self.poll_interval)
            .field("error_backoff", &self.error_backoff)
            .field("work_dir", &self.work_dir)
            .field("media_bucket", &self.media_bucket)
            .field("documents_bucket", &self.documents_bucket)
            .field("artifacts_bucket", &self.artifacts_bucket)
            .field("summary_events_url", &self.summary_events_url)
            .field(
                "summary_event_key",
                &self.summary_event_key.as_ref().map(|_| "<redacted>"),
            )
            .field("summary_delay_minutes", &self.summary_delay_minutes)
            .field("metrics_addr", &self.metrics_addr)
            .finish()
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            poll_interval: std::env::var("WORKER_POLL_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            error_backoff: std::env::var("WORKER_ERROR_BACKOFF_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.error_backoff),
            work_dir: std::env::var("WORKER_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            media_bucket: std::env::var("MEDIA_BUCKET").unwrap_or(defaults.media_bucket),
            documents_bucket: std::env::var("DOCUMENTS_BUCKET").unwrap_or(defaults.documents_bucket),
            artifacts_bucket: std::env::var("ARTIFACTS_BUCKET").unwrap_or(defaults.artifacts_bucket),
            summary_events_url: non_empty_var("SUMMARY_EVENTS_URL"),
            summary_event_key: non_empty_var("SUMMARY_EVENT_KEY"),
            summary_delay_minutes: std::env::var("SUMMARY_DELAY_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.summary_delay_minutes),
            metrics_addr: non_empty_var("METRICS_ADDR"),
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}
