//! Ingestion worker.
//!
//! This crate provides:
//! - The queue-polling dispatcher with start/stop control
//! - Video, website and document processors
//! - Best-effort summary scheduling with an outcome channel
//! - Structured job logging and worker metrics

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod processors;
pub mod scheduler;

pub use config::WorkerConfig;
pub use dispatcher::Worker;
pub use error::{WorkerError, WorkerResult};
pub use logging::JobLogger;
pub use processors::{
    DocumentProcessor, Extracted, JobHandler, JobOutcome, ProcessorRouter, SourceProcessor,
    VideoProcessor, WebsiteProcessor,
};
pub use scheduler::{
    spawn_outcome_logger, summary_requests, BestEffortScheduler, HttpSummaryScheduler,
    ScheduleOutcome, SummaryScheduler,
};
