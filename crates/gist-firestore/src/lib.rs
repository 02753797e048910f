//! Firestore REST API client and document status repository.
//!
//! This crate provides:
//! - The `StatusRepository` contract used by the worker
//! - A Firestore-backed implementation with transition checks
//! - An in-memory implementation for tests and local runs
//! - Service account authentication via gcp_auth
//! - Token caching, retry with jitter and request metrics

pub mod client;
pub mod error;
pub mod memory;
pub mod metrics;
pub mod retry;
pub mod status;
pub mod token_cache;
pub mod types;


pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult, StatusResult};
pub use memory::InMemoryStatusRepository;
pub use retry::RetryConfig;
pub use status::{FirestoreStatusRepository, StatusRepository};
pub use token_cache::TokenCache;
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value};
