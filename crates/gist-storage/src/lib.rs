//! Object storage for media, uploads and scrape artifacts.
//!
//! This crate provides:
//! - The `ObjectStore` contract with explicit bucket selection
//! - An S3-compatible client (AWS S3, R2, MinIO)
//! - An in-memory store for tests and local runs
//! - Deterministic object keys and gzip artifact encoding

pub mod artifact;
pub mod client;
pub mod error;
pub mod keys;
pub mod memory;
pub mod store;

pub use artifact::{gunzip, gzip, GZIP_CONTENT_TYPE};
pub use client::{S3Client, S3Config};
pub use error::{StorageError, StorageResult};
pub use memory::InMemoryStore;
pub use store::ObjectStore;
