//! Queue-polling job dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, Instrument};

use gist_firestore::StatusRepository;
use gist_models::{DocumentPatch, Job, NewDocument, ProcessingStatus, SourceType};
use gist_queue::{parse_job, QueueClient, QueueNames, ReceivedMessage};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::JobLogger;
use crate::metrics::{self, JobResult};
use crate::processors::{JobHandler, JobOutcome};

#[derive(Default)]
struct LoopState {
    /// A loop task exists and has not yet observed `running == false`
    active: bool,
    handle: Option<JoinHandle<()>>,
}

struct Inner {
    queue: Arc<dyn QueueClient>,
    names: QueueNames,
    handler: Arc<dyn JobHandler>,
    status: Arc<dyn StatusRepository>,
    config: WorkerConfig,
    running: AtomicBool,
    state: Mutex<LoopState>,
}

/// Polls the source queues and runs one job at a time.
///
/// Every received message is deleted exactly once, whatever the job's
/// outcome. There is no retry and no dead-letter queue: a failed job leaves
/// its document in `error`.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<Inner>,
}

impl Worker {
    pub fn new(
        queue: Arc<dyn QueueClient>,
        names: QueueNames,
        handler: Arc<dyn JobHandler>,
        status: Arc<dyn StatusRepository>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queue,
                names,
                handler,
                status,
                config,
                running: AtomicBool::new(false),
                state: Mutex::new(LoopState::default()),
            }),
        }
    }

    /// Start polling. No-op when already running.
    ///
    /// After `stop()`, a loop that is still finishing its in-flight job picks
    /// the flag back up instead of a second loop being spawned.
    pub fn start(&self) {
        let mut state = self.inner.lock_state();
        let was_running = self.inner.running.swap(true, Ordering::SeqCst);

        if state.active {
            if !was_running {
                info!("Worker resumed");
            }
            return;
        }

        state.active = true;
        let inner = Arc::clone(&self.inner);
        state.handle = Some(tokio::spawn(async move { inner.run_loop().await }));
        info!("Worker started");
    }

    /// Stop after the current iteration. Does not interrupt an in-flight job.
    pub fn stop(&self) {
        if self.inner.running.swap(false, Ordering::SeqCst) {
            info!("Worker stopping");
        }
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::SeqCst)
    }

    /// Stop and wait for the loop task to exit.
    pub async fn shutdown(&self) {
        self.stop();
        let handle = self.inner.lock_state().handle.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Worker loop panicked: {}", e);
            }
        }
        info!("Worker stopped");
    }

    /// One pass over all queues; returns the number of messages handled.
    pub async fn run_once(&self) -> WorkerResult<usize> {
        self.inner.run_once().await
    }
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, LoopState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn run_loop(&self) {
        loop {
            {
                let mut state = self.lock_state();
                if !self.running.load(Ordering::SeqCst) {
                    state.active = false;
                    break;
                }
            }

            match self.run_once().await {
                Ok(_) => tokio::time::sleep(self.config.poll_interval).await,
                Err(e) => {
                    error!("Error polling queues: {}", e);
                    metrics::record_poll_error();
                    tokio::time::sleep(self.config.error_backoff).await;
                }
            }
        }
        debug!("Worker loop exited");
    }

    async fn run_once(&self) -> WorkerResult<usize> {
        let mut handled = 0;

        for (source_type, queue) in self.names.all() {
            let Some(message) = self.queue.receive(queue).await? else {
                continue;
            };

            self.handle_message(source_type, queue, message).await?;
            handled += 1;
        }

        Ok(handled)
    }

    /// Process one message, then delete it.
    async fn handle_message(&self, source_type: SourceType, queue: &str, message: ReceivedMessage) -> WorkerResult<()> {
        let started = Instant::now();

        let result = match parse_job(source_type, &message.id, &message.body) {
            Ok(job) => self.process_job(job).await,
            Err(e) => {
                JobLogger::from_message(&message.id, source_type)
                    .log_warning(&format!("Discarding malformed message: {}", e));
                JobResult::Malformed
            }
        };

        self.queue.delete(queue, &message.id).await?;
        metrics::record_job(source_type, result, started.elapsed());
        Ok(())
    }

    async fn process_job(&self, job: Job) -> JobResult {
        let logger = JobLogger::new(&job);
        logger.log_start(&job.label());

        let document_id = match self.resolve_document(&job).await {
            Ok(id) => id,
            Err(e) => {
                logger.log_error(&format!("Could not resolve document: {}", e));
                return JobResult::Failed;
            }
        };
        let logger = logger.with_document(&document_id);

        let outcome = self
            .handler
            .handle(&job, &document_id)
            .instrument(logger.create_span())
            .await;

        match outcome {
            Ok(JobOutcome::Completed { strategy }) => {
                metrics::record_strategy(strategy);
                logger.log_completion(strategy.as_str());
                JobResult::Completed
            }
            Ok(JobOutcome::Skipped) => {
                logger.log_completion("skipped, already extracted");
                JobResult::Skipped
            }
            Err(e) => {
                let message = e.user_message();
                logger.log_error(&message);

                if let Err(patch_err) = self
                    .status
                    .update_status(&document_id, ProcessingStatus::Error, DocumentPatch::error(message))
                    .await
                {
                    logger.log_warning(&format!("Failed to record error status: {}", patch_err));
                }
                JobResult::Failed
            }
        }
    }

    /// Document named by the job, or a fresh one when it names none.
    async fn resolve_document(&self, job: &Job) -> WorkerResult<String> {
        if let Some(id) = &job.document_id {
            return Ok(id.clone());
        }

        let title = job
            .file_name
            .as_ref()
            .or(job.source_url.as_ref())
            .unwrap_or(&job.source_id)
            .clone();

        let mut document = NewDocument::new(&job.user_id, title, job.source_type.content_type())
            .with_collection(job.collection().map(str::to_string));
        let source_url = job
            .source_url
            .clone()
            .or_else(|| (job.source_type != SourceType::Document).then(|| job.source_id.clone()));
        if let Some(url) = source_url {
            document = document.with_source_url(url);
        }

        let id = self.status.create_document(document).await?;
        info!(job_id = %job.queue_message_id, document_id = %id, "Created document for job");
        Ok(id)
    }
}
