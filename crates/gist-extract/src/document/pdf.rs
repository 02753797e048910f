//! Staged PDF extraction.

use std::path::Path;
use std::sync::Arc;

use lopdf::Document;
use tracing::{debug, info, warn};

use gist_models::{ExtractionOutcome, ExtractionStrategy};

use super::ocr::{self, OcrEngine, PageRasterizer};
use super::{OcrSettings, PdfHeuristics};
use crate::error::{ExtractError, ExtractResult, PdfDiagnostic, StageAttempt};

const IMAGE_MARKERS: &[&[u8]] = &[
    b"/Subtype /Image",
    b"/Subtype/Image",
    b"/DeviceRGB",
    b"/DeviceGray",
    b"/DeviceCMYK",
];

/// How far into the file the `%PDF-` header may start.
const HEADER_WINDOW: usize = 1024;

pub(super) fn has_image_markers(raw: &[u8]) -> bool {
    IMAGE_MARKERS.iter().any(|marker| contains(raw, marker))
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Validate structure and count pages.
///
/// Anything returned as `Err` is terminal; no text extraction is attempted.
pub(super) fn validate(bytes: &[u8]) -> Result<(Document, usize), PdfDiagnostic> {
    let window = &bytes[..bytes.len().min(HEADER_WINDOW)];
    let header_present = contains(window, b"%PDF-");
    let encryption_suspected = contains(bytes, b"/Encrypt");

    let diagnostic = |reason: String| PdfDiagnostic {
        file_size: bytes.len() as u64,
        header_present,
        encryption_suspected,
        reason,
    };

    if !header_present {
        return Err(diagnostic("PDF header missing".to_string()));
    }

    if encryption_suspected {
        return Err(diagnostic("PDF is encrypted".to_string()));
    }

    let document = Document::load_mem(bytes)
        .map_err(|e| diagnostic(format!("PDF structure could not be parsed: {}", e)))?;

    if document.is_encrypted() {
        return Err(diagnostic("PDF is encrypted".to_string()));
    }

    let page_count = document.get_pages().len();
    if page_count == 0 {
        return Err(diagnostic("PDF has no pages".to_string()));
    }

    Ok((document, page_count))
}

/// Text from `pdf-extract`, run on the blocking pool.
async fn direct_text(bytes: Arc<[u8]>) -> Result<String, String> {
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| {
            if e.is_panic() {
                "parser panicked".to_string()
            } else {
                format!("task failed: {}", e)
            }
        })?
        .map_err(|e| e.to_string())
}

/// Per-page text from `lopdf`, run on the blocking pool.
async fn alternate_text(document: Document) -> Result<String, String> {
    tokio::task::spawn_blocking(move || {
        let mut pages = Vec::new();
        for page_number in document.get_pages().keys() {
            match document.extract_text(&[*page_number]) {
                Ok(text) => pages.push(text),
                Err(e) => debug!(page = page_number, "lopdf page extraction failed: {}", e),
            }
        }
        pages.join("\n")
    })
    .await
    .map_err(|e| {
        if e.is_panic() {
            "parser panicked".to_string()
        } else {
            format!("task failed: {}", e)
        }
    })
}

pub(super) struct PdfPipeline<'a> {
    pub heuristics: &'a PdfHeuristics,
    pub ocr: &'a OcrSettings,
    pub rasterizer: &'a dyn PageRasterizer,
    pub engine: &'a dyn OcrEngine,
}

impl PdfPipeline<'_> {
    pub async fn run(
        &self,
        path: &Path,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> ExtractResult<ExtractionOutcome> {
        let bytes: Arc<[u8]> = Arc::from(bytes);

        let validated = {
            let bytes = Arc::clone(&bytes);
            tokio::task::spawn_blocking(move || validate(&bytes))
                .await
                .map_err(|e| {
                    ExtractError::InvalidPdf(PdfDiagnostic {
                        file_size: 0,
                        header_present: false,
                        encryption_suspected: false,
                        reason: format!("validation task failed: {}", e),
                    })
                })?
        };
        let (document, page_count) = validated.map_err(|diagnostic| {
            warn!(file = %file_name, "Rejecting invalid PDF: {}", diagnostic);
            ExtractError::InvalidPdf(diagnostic)
        })?;
        debug!(pages = page_count, "PDF structure valid");

        let mut stages = Vec::new();
        // Sparse text kept in case nothing better turns up
        let mut fallback: Option<(String, ExtractionStrategy)> = None;

        match direct_text(Arc::clone(&bytes)).await {
            Ok(text) if self.heuristics.is_usable(&text, &bytes) => {
                return Ok(ExtractionOutcome::new(text.trim(), ExtractionStrategy::PdfDirectText));
            }
            Ok(text) => {
                stages.push(StageAttempt::new("pdf-extract", describe_unusable(&text)));
                keep_longer(&mut fallback, text, ExtractionStrategy::PdfDirectText);
            }
            Err(e) => stages.push(StageAttempt::new("pdf-extract", format!("failed: {}", e))),
        }

        match alternate_text(document).await {
            Ok(text) if self.heuristics.is_usable(&text, &bytes) => {
                info!(file = %file_name, "Using alternate PDF text extraction");
                return Ok(ExtractionOutcome::new(text.trim(), ExtractionStrategy::PdfAlternateText));
            }
            Ok(text) => {
                stages.push(StageAttempt::new("lopdf", describe_unusable(&text)));
                keep_longer(&mut fallback, text, ExtractionStrategy::PdfAlternateText);
            }
            Err(e) => stages.push(StageAttempt::new("lopdf", format!("failed: {}", e))),
        }

        if self.ocr.enabled {
            info!(file = %file_name, pages = page_count, "No usable text layer, running OCR");
            match ocr::recognize_pdf(path, page_count, self.ocr, self.rasterizer, self.engine).await {
                Ok(result) if !result.text.trim().is_empty() => {
                    let note = result.truncation_note();
                    let mut outcome = ExtractionOutcome::new(result.text, ExtractionStrategy::PdfOcr);
                    if let Some(note) = note {
                        outcome = outcome.with_diagnostic(note);
                    }
                    return Ok(outcome);
                }
                Ok(_) => stages.push(StageAttempt::new("ocr", "no text recognized")),
                Err(e) => stages.push(StageAttempt::new("ocr", format!("failed: {}", e))),
            }
        } else {
            stages.push(StageAttempt::new("ocr", "disabled"));
        }

        if let Some((text, strategy)) = fallback {
            warn!(file = %file_name, "Falling back to sparse text layer");
            return Ok(ExtractionOutcome::new(text.trim(), strategy)
                .with_diagnostic(format!("Low-density text layer kept after: {}", summarize(&stages))));
        }

        Err(ExtractError::NoText {
            file: file_name.to_string(),
            stages,
        })
    }
}

fn describe_unusable(text: &str) -> String {
    let chars = text.chars().filter(|c| !c.is_whitespace()).count();
    if chars == 0 {
        "no text".to_string()
    } else {
        format!("{} chars, below scanned-document threshold", chars)
    }
}

fn keep_longer(slot: &mut Option<(String, ExtractionStrategy)>, text: String, strategy: ExtractionStrategy) {
    if text.trim().is_empty() {
        return;
    }
    let longer = slot
        .as_ref()
        .map_or(true, |(current, _)| text.trim().len() > current.trim().len());
    if longer {
        *slot = Some((text, strategy));
    }
}

fn summarize(stages: &[StageAttempt]) -> String {
    stages
        .iter()
        .map(|s| format!("{}: {}", s.stage, s.result))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
pub(crate) mod test_pdf {
    //! Small PDFs built with lopdf for tests.

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    /// One page per entry of `pages`, each line drawn with Helvetica.
    pub fn text_pdf(pages: &[&str]) -> Vec<u8> {
        build(pages, false)
    }

    /// Like [`text_pdf`] but also declares an image XObject.
    pub fn scanned_pdf(pages: &[&str]) -> Vec<u8> {
        build(pages, true)
    }

    fn build(pages: &[&str], with_image: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
            "Encoding" => "WinAnsiEncoding",
        });

        let mut resources = dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        };
        if with_image {
            let image = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => 1,
                    "Height" => 1,
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                },
                vec![0u8],
            );
            let image_id = doc.add_object(image);
            resources.set("XObject", dictionary! { "Im1" => image_id });
        }
        let resources_id = doc.add_object(resources);

        let mut kids = Vec::new();
        for text in pages {
            let mut operations = vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![50.into(), 740.into()]),
                Operation::new("TL", vec![14.into()]),
            ];
            for line in text.lines() {
                operations.push(Operation::new("Tj", vec![Object::string_literal(line)]));
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("ET", vec![]));

            let content = Content { operations };
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.encode().unwrap_or_default(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::test_pdf::{scanned_pdf, text_pdf};
    use super::*;

    const ARTICLE: &str = "The quarterly report shows steady growth across all regions.\n\
        Revenue increased by twelve percent compared to the previous quarter.\n\
        Operating costs remained flat while headcount grew modestly.\n\
        The board approved the expansion plan for the coming year.";

    /// Rasterizer that writes one placeholder image per page.
    struct FakeRasterizer {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageRasterizer for FakeRasterizer {
        async fn rasterize(
            &self,
            _pdf: &Path,
            pages: u32,
            _dpi: u32,
            out_dir: &Path,
        ) -> ExtractResult<Vec<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut images = Vec::new();
            for page in 1..=pages {
                let image = out_dir.join(format!("page-{:02}.png", page));
                tokio::fs::write(&image, page.to_string()).await?;
                images.push(image);
            }
            Ok(images)
        }
    }

    /// Engine that "recognizes" the page number written by the rasterizer.
    struct FakeEngine;

    #[async_trait]
    impl OcrEngine for FakeEngine {
        async fn recognize(&self, image: &Path, _language: &str) -> ExtractResult<String> {
            let page = tokio::fs::read_to_string(image).await?;
            Ok(format!("scanned text of page {}", page))
        }
    }

    async fn run(bytes: Vec<u8>, ocr: &OcrSettings, rasterizer: &FakeRasterizer) -> ExtractResult<ExtractionOutcome> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.pdf");
        std::fs::write(&path, &bytes).unwrap();

        PdfPipeline {
            heuristics: &PdfHeuristics::default(),
            ocr,
            rasterizer,
            engine: &FakeEngine,
        }
        .run(&path, "upload.pdf", bytes)
        .await
    }

    fn rasterizer() -> FakeRasterizer {
        FakeRasterizer {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_validate_counts_pages() {
        let bytes = text_pdf(&["one", "two", "three"]);
        let (_, pages) = validate(&bytes).unwrap();
        assert_eq!(pages, 3);
    }

    #[test]
    fn test_validate_rejects_missing_header() {
        let mut bytes = text_pdf(&["hello"]);
        bytes[..5].copy_from_slice(b"XXXXX");
        let diagnostic = validate(&bytes).unwrap_err();
        assert!(!diagnostic.header_present);
        assert_eq!(diagnostic.file_size, bytes.len() as u64);
        assert!(diagnostic.to_string().contains("header missing"));
    }

    #[test]
    fn test_validate_rejects_garbage_after_header() {
        let diagnostic = validate(b"%PDF-1.4\nthis is not a pdf body").unwrap_err();
        assert!(diagnostic.header_present);
        assert!(diagnostic.reason.contains("could not be parsed"));
    }

    #[test]
    fn test_validate_flags_encryption_marker() {
        let mut bytes = text_pdf(&["secret"]);
        bytes.extend_from_slice(b"\n% /Encrypt 9 0 R\n");
        let diagnostic = validate(&bytes).unwrap_err();
        assert!(diagnostic.encryption_suspected);
        assert!(diagnostic.reason.contains("encrypted"));
    }

    #[test]
    fn test_image_markers() {
        assert!(has_image_markers(b"<< /Subtype /Image >>"));
        assert!(has_image_markers(b"/ColorSpace /DeviceCMYK"));
        assert!(!has_image_markers(b"<< /Type /Font >>"));
    }

    #[tokio::test]
    async fn test_text_pdf_uses_direct_text_and_never_ocr() {
        let rasterizer = rasterizer();
        let outcome = run(text_pdf(&[ARTICLE]), &OcrSettings::default(), &rasterizer)
            .await
            .unwrap();

        assert!(!outcome.is_ocr());
        assert!(matches!(
            outcome.strategy,
            ExtractionStrategy::PdfDirectText | ExtractionStrategy::PdfAlternateText
        ));
        assert!(outcome.text.contains("quarterly report"));
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_header_never_reaches_ocr() {
        let rasterizer = rasterizer();
        let mut bytes = scanned_pdf(&["x"]);
        bytes[..5].copy_from_slice(b"JUNK!");

        let err = run(bytes, &OcrSettings::default(), &rasterizer).await.unwrap_err();
        assert!(matches!(err, ExtractError::InvalidPdf(_)));
        assert!(err.to_string().contains("header missing"));
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_sparse_scanned_pdf_goes_to_ocr_in_page_order() {
        let rasterizer = rasterizer();
        let outcome = run(scanned_pdf(&["", "", "", "", ""]), &OcrSettings::default(), &rasterizer)
            .await
            .unwrap();

        assert_eq!(outcome.strategy, ExtractionStrategy::PdfOcr);
        assert!(outcome.is_ocr());
        assert_eq!(rasterizer.calls.load(Ordering::SeqCst), 1);

        let first = outcome.text.find("--- Page 1 ---").unwrap();
        let fifth = outcome.text.find("--- Page 5 ---").unwrap();
        assert!(first < fifth);
        assert!(outcome.text.contains("scanned text of page 3"));
        assert!(outcome.diagnostic.is_none());
    }

    #[tokio::test]
    async fn test_ocr_page_cap_adds_truncation_note() {
        let rasterizer = rasterizer();
        let settings = OcrSettings {
            max_pages: 2,
            ..Default::default()
        };
        let outcome = run(scanned_pdf(&["", "", "", ""]), &settings, &rasterizer)
            .await
            .unwrap();

        assert!(outcome.text.contains("--- Page 2 ---"));
        assert!(!outcome.text.contains("--- Page 3 ---"));
        assert!(outcome.diagnostic.unwrap().contains("2 of 4"));
    }

    #[tokio::test]
    async fn test_blank_pdf_with_ocr_disabled_lists_stages() {
        let rasterizer = rasterizer();
        let settings = OcrSettings {
            enabled: false,
            ..Default::default()
        };
        let err = run(scanned_pdf(&[""]), &settings, &rasterizer).await.unwrap_err();

        match err {
            ExtractError::NoText { file, stages } => {
                assert_eq!(file, "upload.pdf");
                let names: Vec<_> = stages.iter().map(|s| s.stage).collect();
                assert_eq!(names, vec!["pdf-extract", "lopdf", "ocr"]);
                assert_eq!(stages[2].result, "disabled");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_sparse_text_kept_when_ocr_unavailable() {
        let rasterizer = rasterizer();
        let settings = OcrSettings {
            enabled: false,
            ..Default::default()
        };
        let outcome = run(scanned_pdf(&["Figure 1"]), &settings, &rasterizer).await.unwrap();

        assert!(!outcome.is_ocr());
        assert!(outcome.text.contains("Figure"));
        assert!(outcome.diagnostic.unwrap().contains("ocr: disabled"));
    }
}
