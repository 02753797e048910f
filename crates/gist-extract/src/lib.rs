//! Text extraction for uploaded documents and web pages.
//!
//! This crate provides:
//! - File type sniffing from signature bytes and file names
//! - `DocumentExtractor` with a staged PDF pipeline (direct text, alternate
//!   parser, OCR) plus DOCX, plain text and spreadsheet handling
//! - `WebsiteExtractor` for fetching a page and isolating its main content,
//!   with optional model-assisted refinement

pub mod document;
pub mod error;
pub mod sniff;
pub mod website;

pub use document::{
    DocumentExtractor, DocumentExtractorConfig, OcrEngine, OcrSettings, PageRasterizer,
    PdfHeuristics, PdftoppmRasterizer, TesseractOcr,
};
pub use error::{ExtractError, ExtractResult, PdfDiagnostic, StageAttempt};
pub use sniff::{sniff, FileKind};
pub use website::{
    clean_html, CleanedPage, ContentSelector, FetchedPage, GeminiContentSelector, WebsiteConfig,
    WebsiteExtraction, WebsiteExtractor, WebsiteFetcher,
};
