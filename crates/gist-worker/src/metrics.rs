//! Worker metrics collection.

use std::time::Duration;

use metrics::{counter, histogram};

use gist_models::{ExtractionStrategy, SourceType, SummaryType};

/// Metric name constants for consistency.
pub mod names {
    /// Jobs handled by source type and outcome.
    pub const JOBS_TOTAL: &str = "gist_worker_jobs_total";

    /// Job duration in seconds by source type.
    pub const JOB_DURATION_SECONDS: &str = "gist_worker_job_duration_seconds";

    /// Successful extractions by strategy.
    pub const EXTRACTION_STRATEGY_TOTAL: &str = "gist_worker_extraction_strategy_total";

    /// Summary scheduling failures by summary type.
    pub const SCHEDULE_FAILURES_TOTAL: &str = "gist_worker_schedule_failures_total";

    /// Failed passes over the queues.
    pub const POLL_ERRORS_TOTAL: &str = "gist_worker_poll_errors_total";
}

/// Terminal result of one queue message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobResult {
    Completed,
    Skipped,
    Failed,
    Malformed,
}

impl JobResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobResult::Completed => "completed",
            JobResult::Skipped => "skipped",
            JobResult::Failed => "failed",
            JobResult::Malformed => "malformed",
        }
    }
}

/// Record a handled queue message.
pub fn record_job(source_type: SourceType, result: JobResult, elapsed: Duration) {
    counter!(
        names::JOBS_TOTAL,
        "source_type" => source_type.as_str(),
        "outcome" => result.as_str()
    )
    .increment(1);

    histogram!(
        names::JOB_DURATION_SECONDS,
        "source_type" => source_type.as_str()
    )
    .record(elapsed.as_secs_f64());
}

/// Record which strategy produced a document's text.
pub fn record_strategy(strategy: ExtractionStrategy) {
    counter!(names::EXTRACTION_STRATEGY_TOTAL, "strategy" => strategy.as_str()).increment(1);
}

/// Record a summary that could not be scheduled.
pub fn record_schedule_failure(summary_type: SummaryType) {
    counter!(names::SCHEDULE_FAILURES_TOTAL, "summary_type" => summary_type.as_str()).increment(1);
}

pub fn record_poll_error() {
    counter!(names::POLL_ERRORS_TOTAL).increment(1);
}
