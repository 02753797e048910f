//! Downstream summary scheduling.
//!
//! Scheduling is a side effect of a finished job, never part of its
//! result: every request runs on its own task and reports on an outcome
//! channel that a logger task drains.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use gist_models::{Job, SummaryRequest, SummaryType};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Event name understood by the summarization stage.
pub const SUMMARY_EVENT: &str = "summary/generate";

/// Something that can queue summary generation.
#[async_trait]
pub trait SummaryScheduler: Send + Sync {
    async fn schedule_summary(&self, request: SummaryRequest, delay_minutes: u32) -> WorkerResult<()>;
}

#[derive(Debug, Serialize)]
struct SummaryEvent<'a> {
    name: &'static str,
    data: &'a SummaryRequest,
    delay: String,
}

/// Sends summary events to an HTTP events endpoint.
pub struct HttpSummaryScheduler {
    client: Client,
    events_url: String,
    event_key: Option<String>,
}

impl HttpSummaryScheduler {
    pub fn new(events_url: impl Into<String>, event_key: Option<String>) -> WorkerResult<Self> {
        let client = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            client,
            events_url: events_url.into(),
            event_key,
        })
    }

    /// `None` when no events endpoint is configured.
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Option<Self>> {
        config
            .summary_events_url
            .as_ref()
            .map(|url| Self::new(url.clone(), config.summary_event_key.clone()))
            .transpose()
    }
}

#[async_trait]
impl SummaryScheduler for HttpSummaryScheduler {
    async fn schedule_summary(&self, request: SummaryRequest, delay_minutes: u32) -> WorkerResult<()> {
        let event = SummaryEvent {
            name: SUMMARY_EVENT,
            data: &request,
            delay: format!("{}m", delay_minutes),
        };

        let mut builder = self.client.post(&self.events_url).json(&event);
        if let Some(key) = &self.event_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkerError::schedule_failed(format!(
                "events endpoint returned {}: {}",
                status, body
            )));
        }

        debug!(
            document_id = %request.document_id,
            summary_type = %request.summary_type,
            "Summary event accepted"
        );
        Ok(())
    }
}

/// Result of one scheduling attempt.
#[derive(Debug)]
pub struct ScheduleOutcome {
    pub document_id: String,
    pub summary_type: SummaryType,
    pub result: WorkerResult<()>,
}

/// Fire-and-forget front of a [`SummaryScheduler`].
#[derive(Clone)]
pub struct BestEffortScheduler {
    inner: Option<Arc<dyn SummaryScheduler>>,
    outcomes: mpsc::UnboundedSender<ScheduleOutcome>,
    delay_minutes: u32,
}

impl BestEffortScheduler {
    /// Wrap `inner`; the receiver yields one outcome per request.
    pub fn new(
        inner: Option<Arc<dyn SummaryScheduler>>,
        delay_minutes: u32,
    ) -> (Self, mpsc::UnboundedReceiver<ScheduleOutcome>) {
        let (outcomes, rx) = mpsc::unbounded_channel();
        (
            Self {
                inner,
                outcomes,
                delay_minutes,
            },
            rx,
        )
    }

    /// Scheduler that drops every request.
    pub fn disabled() -> Self {
        Self::new(None, 0).0
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Spawn one task per request. Never blocks and never fails.
    pub fn schedule(&self, requests: Vec<SummaryRequest>) -> Vec<JoinHandle<()>> {
        let Some(inner) = &self.inner else {
            if !requests.is_empty() {
                debug!(count = requests.len(), "Summary scheduling disabled, dropping requests");
            }
            return Vec::new();
        };

        requests
            .into_iter()
            .map(|request| {
                let inner = Arc::clone(inner);
                let outcomes = self.outcomes.clone();
                let delay = self.delay_minutes;

                tokio::spawn(async move {
                    let document_id = request.document_id.clone();
                    let summary_type = request.summary_type;
                    let result = inner.schedule_summary(request, delay).await;

                    // Receiver gone means the process is shutting down
                    let _ = outcomes.send(ScheduleOutcome {
                        document_id,
                        summary_type,
                        result,
                    });
                })
            })
            .collect()
    }
}

/// Drain scheduling outcomes, logging and counting failures.
pub fn spawn_outcome_logger(mut outcomes: mpsc::UnboundedReceiver<ScheduleOutcome>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(outcome) = outcomes.recv().await {
            match outcome.result {
                Ok(()) => debug!(
                    document_id = %outcome.document_id,
                    summary_type = %outcome.summary_type,
                    "Summary scheduled"
                ),
                Err(e) => {
                    warn!(
                        document_id = %outcome.document_id,
                        summary_type = %outcome.summary_type,
                        "Failed to schedule summary: {}", e
                    );
                    metrics::record_schedule_failure(outcome.summary_type);
                }
            }
        }
    })
}

/// One request per summary type the job asks for.
pub fn summary_requests(job: &Job, document_id: &str, text: &str) -> Vec<SummaryRequest> {
    SummaryType::requested_by(&job.processing_options)
        .into_iter()
        .map(|summary_type| SummaryRequest {
            user_id: job.user_id.clone(),
            document_id: document_id.to_string(),
            text: text.to_string(),
            summary_type,
            processing_options: job.processing_options.clone(),
        })
        .collect()
}
