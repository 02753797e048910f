//! Extraction outcomes shared by the extractors and the worker.

use serde::{Deserialize, Serialize};

/// Strategy that produced a piece of extracted text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Captions published with the video
    NativeCaptions,
    /// Metadata-derived stand-in; not speech-derived
    PlaceholderTranscript,
    /// Primary PDF text layer extraction
    PdfDirectText,
    /// Second PDF parser after the primary yielded no usable text
    PdfAlternateText,
    /// Rasterized pages run through OCR
    PdfOcr,
    WordProcessor,
    PlainText,
    /// Best-effort decode of text that was not valid UTF-8
    PlainTextLossy,
    SpreadsheetStub,
    /// Word-processor format the extractor cannot read (RTF, ODT, Pages)
    UnsupportedFormatStub,
    /// Unrecognized file type that decoded as text
    UnknownText,
    WebsiteScrape,
    /// Website scrape passed through the content-selection service
    WebsiteRefined,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStrategy::NativeCaptions => "native_captions",
            ExtractionStrategy::PlaceholderTranscript => "placeholder_transcript",
            ExtractionStrategy::PdfDirectText => "pdf_direct_text",
            ExtractionStrategy::PdfAlternateText => "pdf_alternate_text",
            ExtractionStrategy::PdfOcr => "pdf_ocr",
            ExtractionStrategy::WordProcessor => "word_processor",
            ExtractionStrategy::PlainText => "plain_text",
            ExtractionStrategy::PlainTextLossy => "plain_text_lossy",
            ExtractionStrategy::SpreadsheetStub => "spreadsheet_stub",
            ExtractionStrategy::UnsupportedFormatStub => "unsupported_format_stub",
            ExtractionStrategy::UnknownText => "unknown_text",
            ExtractionStrategy::WebsiteScrape => "website_scrape",
            ExtractionStrategy::WebsiteRefined => "website_refined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let strategy = match value {
            "native_captions" => ExtractionStrategy::NativeCaptions,
            "placeholder_transcript" => ExtractionStrategy::PlaceholderTranscript,
            "pdf_direct_text" => ExtractionStrategy::PdfDirectText,
            "pdf_alternate_text" => ExtractionStrategy::PdfAlternateText,
            "pdf_ocr" => ExtractionStrategy::PdfOcr,
            "word_processor" => ExtractionStrategy::WordProcessor,
            "plain_text" => ExtractionStrategy::PlainText,
            "plain_text_lossy" => ExtractionStrategy::PlainTextLossy,
            "spreadsheet_stub" => ExtractionStrategy::SpreadsheetStub,
            "unsupported_format_stub" => ExtractionStrategy::UnsupportedFormatStub,
            "unknown_text" => ExtractionStrategy::UnknownText,
            "website_scrape" => ExtractionStrategy::WebsiteScrape,
            "website_refined" => ExtractionStrategy::WebsiteRefined,
            _ => return None,
        };
        Some(strategy)
    }

    /// OCR-derived text is a partial extraction worth flagging downstream.
    pub fn is_ocr(&self) -> bool {
        matches!(self, ExtractionStrategy::PdfOcr)
    }
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Text produced by an extractor, with the strategy that produced it.
///
/// Never persisted directly; the worker folds it into a document patch.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    pub text: String,
    pub strategy: ExtractionStrategy,
    /// Notes about partial results (truncation, lossy decode, capped pages)
    pub diagnostic: Option<String>,
}

impl ExtractionOutcome {
    pub fn new(text: impl Into<String>, strategy: ExtractionStrategy) -> Self {
        Self {
            text: text.into(),
            strategy,
            diagnostic: None,
        }
    }

    pub fn with_diagnostic(mut self, diagnostic: impl Into<String>) -> Self {
        self.diagnostic = Some(diagnostic.into());
        self
    }

    pub fn is_ocr(&self) -> bool {
        self.strategy.is_ocr()
    }
}
