//! Uploaded document extraction.
//!
//! [`DocumentExtractor::extract`] sniffs the file, then runs the pipeline
//! for its family. PDFs go through a staged fallback: direct text, the
//! alternate parser, then OCR over rasterized pages.

mod docx;
mod ocr;
mod pdf;
mod text;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, info_span, Instrument};

use gist_models::{ExtractionOutcome, ExtractionStrategy};

use crate::error::{ExtractError, ExtractResult};
use crate::sniff::{sniff, FileKind};

pub use ocr::{OcrEngine, PageRasterizer, PdftoppmRasterizer, TesseractOcr};

/// Thresholds of the scanned-PDF heuristic.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfHeuristics {
    /// Fewer non-whitespace characters than this counts as sparse
    pub min_chars: usize,
    /// Characters per byte of file below this counts as sparse
    pub min_text_ratio: f64,
}

impl Default for PdfHeuristics {
    fn default() -> Self {
        Self {
            min_chars: 100,
            min_text_ratio: 0.001,
        }
    }
}

impl PdfHeuristics {
    /// Whether `text` extracted from `raw` is worth keeping.
    ///
    /// Sparse text is only rejected when the file also carries image or
    /// device colour-space objects, i.e. looks scanned. Blank text is never
    /// usable.
    pub fn is_usable(&self, text: &str, raw: &[u8]) -> bool {
        let chars = text.chars().filter(|c| !c.is_whitespace()).count();
        if chars == 0 {
            return false;
        }

        let ratio = if raw.is_empty() {
            1.0
        } else {
            chars as f64 / raw.len() as f64
        };
        let sparse = chars < self.min_chars || ratio < self.min_text_ratio;

        !(sparse && pdf::has_image_markers(raw))
    }
}

/// OCR fallback settings.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrSettings {
    pub enabled: bool,
    /// Pages beyond this are not rasterized
    pub max_pages: u32,
    /// Pages recognized concurrently
    pub batch_size: usize,
    pub dpi: u32,
    /// Tesseract language code
    pub language: String,
    /// Per external command
    pub command_timeout: Duration,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_pages: 20,
            batch_size: 3,
            dpi: 300,
            language: "eng".to_string(),
            command_timeout: Duration::from_secs(120),
        }
    }
}

/// Document extractor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentExtractorConfig {
    pub heuristics: PdfHeuristics,
    pub ocr: OcrSettings,
    /// Bytes decoded when plain text is not valid UTF-8
    pub text_decode_cap_bytes: usize,
}

impl Default for DocumentExtractorConfig {
    fn default() -> Self {
        Self {
            heuristics: PdfHeuristics::default(),
            ocr: OcrSettings::default(),
            text_decode_cap_bytes: 5 * 1024 * 1024,
        }
    }
}

impl DocumentExtractorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            heuristics: PdfHeuristics {
                min_chars: env_parse("PDF_SCANNED_MIN_CHARS", defaults.heuristics.min_chars),
                min_text_ratio: env_parse(
                    "PDF_SCANNED_MIN_TEXT_RATIO",
                    defaults.heuristics.min_text_ratio,
                ),
            },
            ocr: OcrSettings {
                enabled: env_parse("OCR_ENABLED", defaults.ocr.enabled),
                max_pages: env_parse("OCR_MAX_PAGES", defaults.ocr.max_pages).max(1),
                batch_size: env_parse("OCR_BATCH_SIZE", defaults.ocr.batch_size).max(1),
                dpi: env_parse("OCR_DPI", defaults.ocr.dpi),
                language: std::env::var("OCR_LANGUAGE").unwrap_or(defaults.ocr.language),
                command_timeout: Duration::from_secs(env_parse(
                    "OCR_COMMAND_TIMEOUT_SECS",
                    defaults.ocr.command_timeout.as_secs(),
                )),
            },
            text_decode_cap_bytes: env_parse(
                "TEXT_DECODE_CAP_BYTES",
                defaults.text_decode_cap_bytes,
            ),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Extracts text from a local file.
pub struct DocumentExtractor {
    config: DocumentExtractorConfig,
    rasterizer: Arc<dyn PageRasterizer>,
    ocr: Arc<dyn OcrEngine>,
}

impl DocumentExtractor {
    /// Extractor using `pdftoppm` and `tesseract` for OCR.
    pub fn new(config: DocumentExtractorConfig) -> Self {
        let timeout = config.ocr.command_timeout;
        Self::with_ocr(
            config,
            Arc::new(PdftoppmRasterizer::new(timeout)),
            Arc::new(TesseractOcr::new(timeout)),
        )
    }

    /// Extractor with injected OCR collaborators.
    pub fn with_ocr(
        config: DocumentExtractorConfig,
        rasterizer: Arc<dyn PageRasterizer>,
        ocr: Arc<dyn OcrEngine>,
    ) -> Self {
        Self {
            config,
            rasterizer,
            ocr,
        }
    }

    pub fn config(&self) -> &DocumentExtractorConfig {
        &self.config
    }

    /// Extract text from the file at `path`.
    ///
    /// `document_id` is only used for logging.
    pub async fn extract(&self, path: &Path, document_id: &str) -> ExtractResult<ExtractionOutcome> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "document".to_string());

        let span = info_span!("extract_document", document_id = %document_id, file = %file_name);

        async move {
            let bytes = tokio::fs::read(path).await?;
            let kind = sniff(&bytes, Some(file_name.as_str()));
            debug!(kind = %kind, size = bytes.len(), "Sniffed document type");

            let outcome = match kind {
                FileKind::Pdf => self.extract_pdf(path, &file_name, bytes).await?,
                FileKind::WordProcessor => {
                    let text = docx::extract_docx(&bytes)?;
                    ExtractionOutcome::new(text, ExtractionStrategy::WordProcessor)
                }
                FileKind::PlainText => text::decode_text(&bytes, self.config.text_decode_cap_bytes)?,
                FileKind::Spreadsheet => spreadsheet_stub(&file_name, bytes.len()),
                FileKind::UnsupportedDocument => unsupported_format_stub(&file_name, bytes.len()),
                FileKind::Unknown => text::decode_unknown(&bytes, self.config.text_decode_cap_bytes)?,
            };

            info!(
                strategy = %outcome.strategy.as_str(),
                chars = outcome.text.len(),
                ocr = outcome.is_ocr(),
                "Extracted document text"
            );
            Ok(outcome)
        }
        .instrument(span)
        .await
    }

    async fn extract_pdf(
        &self,
        path: &Path,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ExtractResult<ExtractionOutcome> {
        pdf::PdfPipeline {
            heuristics: &self.config.heuristics,
            ocr: &self.config.ocr,
            rasterizer: self.rasterizer.as_ref(),
            engine: self.ocr.as_ref(),
        }
        .run(path, file_name, bytes)
        .await
    }
}

fn spreadsheet_stub(file_name: &str, size: usize) -> ExtractionOutcome {
    ExtractionOutcome::new(
        format!(
            "[Spreadsheet: {} ({} bytes). Cell contents are not extracted.]",
            file_name, size
        ),
        ExtractionStrategy::SpreadsheetStub,
    )
}

fn unsupported_format_stub(file_name: &str, size: usize) -> ExtractionOutcome {
    ExtractionOutcome::new(
        format!(
            "[Document: {} ({} bytes). Unsupported format; text is not extracted.]",
            file_name, size
        ),
        ExtractionStrategy::UnsupportedFormatStub,
    )
    .with_diagnostic(format!("Unsupported word-processor format: {}", file_name))
}
