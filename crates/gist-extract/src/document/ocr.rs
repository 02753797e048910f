//! OCR fallback for PDFs without a usable text layer.
//!
//! Pages are rasterized with `pdftoppm` into a temp dir and recognized
//! with `tesseract`, a batch at a time.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use tokio::process::Command;
use tracing::{debug, warn};

use super::OcrSettings;
use crate::error::{ExtractError, ExtractResult};

/// Turns the first `pages` pages of a PDF into image files.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Returns the images in page order.
    async fn rasterize(&self, pdf: &Path, pages: u32, dpi: u32, out_dir: &Path) -> ExtractResult<Vec<PathBuf>>;
}

/// Recognizes the text of one page image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, image: &Path, language: &str) -> ExtractResult<String>;
}

async fn run_command(mut command: Command, name: &str, timeout: Duration) -> ExtractResult<Vec<u8>> {
    command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(timeout, command.output())
        .await
        .map_err(|_| ExtractError::ocr(format!("{} timed out after {}s", name, timeout.as_secs())))?
        .map_err(|e| ExtractError::ocr(format!("failed to run {}: {}", name, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ExtractError::ocr(format!(
            "{} exited with {}: {}",
            name,
            output.status,
            stderr.trim()
        )));
    }

    Ok(output.stdout)
}

fn resolve(binary: &str) -> ExtractResult<PathBuf> {
    which::which(binary).map_err(|_| ExtractError::ocr(format!("{} not found in PATH", binary)))
}

/// `pdftoppm` from poppler-utils.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    timeout: Duration,
}

impl PdftoppmRasterizer {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl PageRasterizer for PdftoppmRasterizer {
    async fn rasterize(&self, pdf: &Path, pages: u32, dpi: u32, out_dir: &Path) -> ExtractResult<Vec<PathBuf>> {
        let binary = resolve("pdftoppm")?;
        let prefix = out_dir.join("page");

        let mut command = Command::new(binary);
        command
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg(pages.to_string())
            .arg(pdf)
            .arg(&prefix);
        run_command(command, "pdftoppm", self.timeout).await?;

        // pdftoppm zero-pads page numbers to the width of the page count
        let mut images = Vec::new();
        let mut entries = tokio::fs::read_dir(out_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("png") {
                images.push(path);
            }
        }
        images.sort();

        debug!(images = images.len(), "Rasterized PDF pages");
        Ok(images)
    }
}

/// `tesseract` command line OCR.
#[derive(Debug, Clone)]
pub struct TesseractOcr {
    timeout: Duration,
}

impl TesseractOcr {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl OcrEngine for TesseractOcr {
    async fn recognize(&self, image: &Path, language: &str) -> ExtractResult<String> {
        let binary = resolve("tesseract")?;

        let mut command = Command::new(binary);
        command.arg(image).arg("stdout").arg("-l").arg(language);
        let stdout = run_command(command, "tesseract", self.timeout).await?;

        Ok(String::from_utf8_lossy(&stdout).to_string())
    }
}

/// Text recognized from a PDF.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct OcrText {
    pub text: String,
    pub pages_processed: usize,
    pub total_pages: usize,
}

impl OcrText {
    pub fn truncation_note(&self) -> Option<String> {
        (self.pages_processed < self.total_pages).then(|| {
            format!(
                "OCR limited to the first {} of {} pages",
                self.pages_processed, self.total_pages
            )
        })
    }
}

/// Rasterize up to `settings.max_pages` and OCR them in batches.
///
/// The temp image directory lives next to the PDF and is removed when this
/// returns, whatever the outcome.
pub(super) async fn recognize_pdf(
    pdf: &Path,
    total_pages: usize,
    settings: &OcrSettings,
    rasterizer: &dyn PageRasterizer,
    engine: &dyn OcrEngine,
) -> ExtractResult<OcrText> {
    let images_dir = match pdf.parent() {
        Some(parent) => tempfile::Builder::new().prefix("ocr-").tempdir_in(parent)?,
        None => tempfile::Builder::new().prefix("gist-ocr-").tempdir()?,
    };

    let pages = (total_pages as u32).min(settings.max_pages);
    let images = rasterizer
        .rasterize(pdf, pages, settings.dpi, images_dir.path())
        .await?;

    if images.is_empty() {
        return Err(ExtractError::ocr("rasterizer produced no page images"));
    }

    let mut page_texts = Vec::with_capacity(images.len());
    let mut failures = 0usize;

    for (batch_index, batch) in images.chunks(settings.batch_size.max(1)).enumerate() {
        let first_page = batch_index * settings.batch_size.max(1) + 1;
        let results = join_all(
            batch
                .iter()
                .map(|image| engine.recognize(image, &settings.language)),
        )
        .await;

        for (offset, result) in results.into_iter().enumerate() {
            let page = first_page + offset;
            match result {
                Ok(text) => page_texts.push((page, text)),
                Err(e) => {
                    warn!(page, "OCR failed for page: {}", e);
                    failures += 1;
                    page_texts.push((page, format!("[OCR failed for page {}]", page)));
                }
            }
        }
    }

    if failures == page_texts.len() {
        return Err(ExtractError::ocr(format!("all {} pages failed", failures)));
    }

    let recognized = page_texts.iter().any(|(_, text)| !text.trim().is_empty());
    let text = if recognized {
        page_texts
            .iter()
            .map(|(page, text)| format!("--- Page {} ---\n{}", page, text.trim()))
            .collect::<Vec<_>>()
            .join("\n\n")
    } else {
        String::new()
    };

    Ok(OcrText {
        text,
        pages_processed: images.len(),
        total_pages,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    struct ImageRasterizer;

    #[async_trait]
    impl PageRasterizer for ImageRasterizer {
        async fn rasterize(&self, _pdf: &Path, pages: u32, _dpi: u32, out_dir: &Path) -> ExtractResult<Vec<PathBuf>> {
            let mut images = Vec::new();
            for page in 1..=pages {
                let path = out_dir.join(format!("page-{}.png", page));
                std::fs::write(&path, format!("{}", page))?;
                images.push(path);
            }
            Ok(images)
        }
    }

    /// Fails on the configured pages; remembers the directories it saw.
    struct FlakyEngine {
        failing: HashSet<String>,
        seen_dirs: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl OcrEngine for FlakyEngine {
        async fn recognize(&self, image: &Path, language: &str) -> ExtractResult<String> {
            assert_eq!(language, "eng");
            if let Some(parent) = image.parent() {
                self.seen_dirs.lock().unwrap().push(parent.to_path_buf());
            }
            let page = std::fs::read_to_string(image)?;
            if self.failing.contains(&page) {
                return Err(ExtractError::ocr("engine crashed"));
            }
            Ok(format!("text {}", page))
        }
    }

    fn engine(failing: &[&str]) -> FlakyEngine {
        FlakyEngine {
            failing: failing.iter().map(|s| s.to_string()).collect(),
            seen_dirs: Mutex::new(Vec::new()),
        }
    }

    fn pdf_path(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();
        path
    }

    #[tokio::test]
    async fn test_failed_page_gets_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let settings = OcrSettings::default();
        let engine = engine(&["2"]);

        let result = recognize_pdf(&pdf_path(&dir), 3, &settings, &ImageRasterizer, &engine)
            .await
            .unwrap();

        assert!(result.text.contains("--- Page 1 ---\ntext 1"));
        assert!(result.text.contains("[OCR failed for page 2]"));
        assert!(result.text.contains("--- Page 3 ---\ntext 3"));
        assert_eq!(result.truncation_note(), None);
    }

    #[tokio::test]
    async fn test_all_pages_failing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&["1", "2"]);

        let err = recognize_pdf(&pdf_path(&dir), 2, &OcrSettings::default(), &ImageRasterizer, &engine)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("all 2 pages failed"));
    }

    #[tokio::test]
    async fn test_temp_images_removed_after_run() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(&[]);

        recognize_pdf(&pdf_path(&dir), 2, &OcrSettings::default(), &ImageRasterizer, &engine)
            .await
            .unwrap();

        let seen = engine.seen_dirs.lock().unwrap().clone();
        assert!(!seen.is_empty());
        assert!(seen.iter().all(|d| !d.exists()));
    }

    #[tokio::test]
    async fn test_batches_preserve_page_order() {
        let dir = tempfile::tempdir().unwrap();
        let settings = OcrSettings {
            batch_size: 2,
            ..Default::default()
        };
        let engine = engine(&[]);

        let result = recognize_pdf(&pdf_path(&dir), 5, &settings, &ImageRasterizer, &engine)
            .await
            .unwrap();

        let positions: Vec<usize> = (1..=5)
            .map(|p| result.text.find(&format!("--- Page {} ---", p)).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(result.pages_processed, 5);
    }

    #[test]
    fn test_truncation_note() {
        let text = OcrText {
            text: "x".to_string(),
            pages_processed: 20,
            total_pages: 57,
        };
        assert_eq!(
            text.truncation_note().unwrap(),
            "OCR limited to the first 20 of 57 pages"
        );
    }
}
