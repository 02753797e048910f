//! Error types for extraction.

use std::fmt;

use thiserror::Error;

/// Result type for extraction operations.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Structural facts about a PDF that failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfDiagnostic {
    pub file_size: u64,
    pub header_present: bool,
    pub encryption_suspected: bool,
    pub reason: String,
}

impl fmt::Display for PdfDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (size: {} bytes, header {}, encryption suspected: {})",
            self.reason,
            self.file_size,
            if self.header_present { "present" } else { "missing" },
            if self.encryption_suspected { "yes" } else { "no" },
        )
    }
}

/// One extraction stage and what it produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageAttempt {
    pub stage: &'static str,
    pub result: String,
}

impl StageAttempt {
    pub fn new(stage: &'static str, result: impl Into<String>) -> Self {
        Self {
            stage,
            result: result.into(),
        }
    }
}

/// Errors that can occur while extracting text.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid PDF: {0}")]
    InvalidPdf(PdfDiagnostic),

    #[error("No extractable text in {file}: {}", format_stages(.stages))]
    NoText {
        file: String,
        stages: Vec<StageAttempt>,
    },

    #[error(
        "Unreadable word-processor document: {reason} (size: {file_size} bytes, zip signature {})",
        presence(.zip_signature)
    )]
    WordProcessor {
        reason: String,
        file_size: u64,
        zip_signature: bool,
    },

    #[error("Unsupported file: {0}")]
    Unsupported(String),

    #[error("Undecodable file: {0}")]
    Undecodable(String),

    #[error("Empty content: {0}")]
    EmptyContent(String),

    #[error("OCR failed: {0}")]
    Ocr(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Response body of {size} bytes exceeds limit of {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    #[error("Content selection failed: {0}")]
    Selection(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn presence(flag: &bool) -> &'static str {
    if *flag {
        "present"
    } else {
        "absent"
    }
}

fn format_stages(stages: &[StageAttempt]) -> String {
    if stages.is_empty() {
        return "no stages attempted".to_string();
    }
    stages
        .iter()
        .map(|s| format!("{}: {}", s.stage, s.result))
        .collect::<Vec<_>>()
        .join("; ")
}

impl ExtractError {
    pub fn word_processor(reason: impl Into<String>, bytes: &[u8]) -> Self {
        Self::WordProcessor {
            reason: reason.into(),
            file_size: bytes.len() as u64,
            zip_signature: bytes.starts_with(b"PK\x03\x04"),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn undecodable(message: impl Into<String>) -> Self {
        Self::Undecodable(message.into())
    }

    pub fn empty_content(message: impl Into<String>) -> Self {
        Self::EmptyContent(message.into())
    }

    pub fn ocr(message: impl Into<String>) -> Self {
        Self::Ocr(message.into())
    }

    pub fn invalid_url(message: impl Into<String>) -> Self {
        Self::InvalidUrl(message.into())
    }

    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed(message.into())
    }

    pub fn selection(message: impl Into<String>) -> Self {
        Self::Selection(message.into())
    }
}
