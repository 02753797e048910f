//! Gzip encoding of stored artifacts (raw scrapes and the like).

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::{StorageError, StorageResult};

/// Content type for gzip-compressed artifacts.
pub const GZIP_CONTENT_TYPE: &str = "application/gzip";

/// Compress `data` with gzip.
pub fn gzip(data: &[u8]) -> StorageResult<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| StorageError::Encoding(format!("Failed to gzip artifact: {}", e)))?;

    encoder
        .finish()
        .map_err(|e| StorageError::Encoding(format!("Failed to finish gzip encoding: {}", e)))
}

/// Decompress gzip bytes.
pub fn gunzip(data: &[u8]) -> StorageResult<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| StorageError::Encoding(format!("Failed to decompress artifact: {}", e)))?;
    Ok(out)
}
