//! Source queues for the ingestion worker.
//!
//! This crate provides:
//! - The `QueueClient` receive/delete contract with visibility timeouts
//! - A Redis Streams implementation (consumer groups + idle reclaim)
//! - An in-process implementation for tests and local runs
//! - Normalization of queue payloads into canonical `Job`s

pub mod error;
pub mod memory;
pub mod message;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use memory::InMemoryQueue;
pub use message::parse_job;
pub use queue::{QueueClient, QueueConfig, QueueNames, ReceivedMessage, RedisQueue};
