//! Plain text and unknown-type decoding.

use gist_models::{ExtractionOutcome, ExtractionStrategy};
use tracing::warn;

use crate::error::{ExtractError, ExtractResult};

/// Share of printable characters required to accept unknown bytes as text.
const PRINTABLE_THRESHOLD: f64 = 0.9;

/// Decode a file sniffed as plain text.
///
/// Valid UTF-8 is taken as is. Anything else is decoded best-effort from at
/// most `cap` bytes, with a diagnostic noting the lossy decode and any
/// truncation.
pub(super) fn decode_text(bytes: &[u8], cap: usize) -> ExtractResult<ExtractionOutcome> {
    decode(bytes, cap, ExtractionStrategy::PlainText)
}

/// Decode a file of unknown type.
///
/// Accepted only when it reads as mostly printable text; otherwise the
/// error names any embedded signature that explains what it is.
pub(super) fn decode_unknown(bytes: &[u8], cap: usize) -> ExtractResult<ExtractionOutcome> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Err(ExtractError::empty_content("file is empty"));
    }

    let sample = String::from_utf8_lossy(&bytes[..bytes.len().min(cap)]);
    if !bytes.contains(&0) && printable_ratio(&sample) >= PRINTABLE_THRESHOLD {
        let mut outcome = decode(bytes, cap, ExtractionStrategy::UnknownText)?;
        outcome.strategy = ExtractionStrategy::UnknownText;
        return Ok(outcome);
    }

    if let Some(offset) = find(bytes, b"%PDF") {
        return Err(ExtractError::unsupported(format!(
            "embedded PDF signature at byte {} but no recognizable PDF structure ({} bytes)",
            offset,
            bytes.len()
        )));
    }
    if bytes.starts_with(b"PK\x03\x04") || find(bytes, b"word/").is_some() {
        return Err(ExtractError::unsupported(format!(
            "zip container with Word markers but no usable file name ({} bytes)",
            bytes.len()
        )));
    }

    Err(ExtractError::undecodable(format!(
        "binary content of {} bytes is not text and matches no known signature",
        bytes.len()
    )))
}

fn decode(bytes: &[u8], cap: usize, strict_strategy: ExtractionStrategy) -> ExtractResult<ExtractionOutcome> {
    if let Ok(text) = std::str::from_utf8(bytes) {
        let text = text.trim_start_matches('\u{feff}').trim();
        if text.is_empty() {
            return Err(ExtractError::empty_content("file contains no text"));
        }
        return Ok(ExtractionOutcome::new(text, strict_strategy));
    }

    let truncated = bytes.len() > cap;
    let decoded = String::from_utf8_lossy(&bytes[..bytes.len().min(cap)]);
    let text = decoded.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return Err(ExtractError::empty_content("file contains no decodable text"));
    }

    let mut notes = vec!["Invalid UTF-8; decoded with replacement characters".to_string()];
    if truncated {
        warn!(size = bytes.len(), cap, "Truncating oversized text file");
        notes.push(format!("Truncated to the first {} of {} bytes", cap, bytes.len()));
    }

    Ok(ExtractionOutcome::new(text, ExtractionStrategy::PlainTextLossy).with_diagnostic(notes.join(". ")))
}

fn printable_ratio(text: &str) -> f64 {
    let mut total = 0usize;
    let mut printable = 0usize;
    for c in text.chars() {
        total += 1;
        if c != char::REPLACEMENT_CHARACTER && (!c.is_control() || c.is_whitespace()) {
            printable += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        printable as f64 / total as f64
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
