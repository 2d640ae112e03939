use std::sync::Arc;

use super::format::detect_media_kind;
use super::sanitize::sanitize_extracted_text;
use super::types::{
    page_marker, ExtractedText, ExtractionMethod, OcrEngine, PageText, PdfPageRenderer,
};
use super::ExtractionError;
use crate::config::DEFAULT_RENDER_DPI;
use crate::pipeline::types::MediaKind;

/// Hard ceiling on OCR'd pages per document; later pages are skipped and
/// the result is marked degraded.
pub const MAX_PDF_PAGES: usize = 200;

/// Turns uploaded bytes into text. Never fails: every problem becomes a
/// degraded result with an explicit placeholder body.
pub struct DocumentTextExtractor {
    ocr_engine: Option<Arc<dyn OcrEngine>>,
    pdf_renderer: Option<Arc<dyn PdfPageRenderer>>,
    render_dpi: u32,
}

impl DocumentTextExtractor {
    pub fn new(ocr_engine: Option<Arc<dyn OcrEngine>>) -> Self {
        Self {
            ocr_engine,
            pdf_renderer: None,
            render_dpi: DEFAULT_RENDER_DPI,
        }
    }

    /// Add a PDF page renderer for per-page OCR.
    pub fn with_pdf_renderer(mut self, renderer: Arc<dyn PdfPageRenderer>) -> Self {
        self.pdf_renderer = Some(renderer);
        self
    }

    pub fn with_render_dpi(mut self, dpi: u32) -> Self {
        self.render_dpi = dpi;
        self
    }

    pub fn ocr_available(&self) -> bool {
        self.ocr_engine.is_some()
    }

    pub fn extract(&self, bytes: &[u8], filename: &str) -> ExtractedText {
        let _span =
            tracing::info_span!("extract", filename = %filename, size = bytes.len()).entered();

        if bytes.is_empty() {
            tracing::warn!("Empty document, nothing to extract");
            return ExtractedText::unavailable(
                filename,
                MediaKind::Unknown,
                ExtractionError::EmptyInput.to_string(),
            );
        }

        let media_kind = detect_media_kind(bytes, filename);
        let Some(ocr) = self.ocr_engine.as_deref() else {
            tracing::warn!("No OCR engine configured, returning degraded text");
            return ExtractedText::unavailable(
                filename,
                media_kind,
                ExtractionError::OcrUnavailable.to_string(),
            );
        };

        let result = match media_kind {
            MediaKind::Image => self.extract_image(ocr, bytes, filename),
            MediaKind::Pdf => self.extract_pdf(ocr, bytes, filename),
            MediaKind::Unknown => {
                tracing::warn!("Unsupported media type");
                ExtractedText::unavailable(filename, media_kind, "unsupported media type")
            }
        };

        tracing::info!(
            media_kind = ?result.media_kind,
            pages = result.page_count(),
            text_len = result.text.len(),
            degraded = result.degraded,
            "Extraction complete"
        );
        result
    }

    fn extract_image(&self, ocr: &dyn OcrEngine, bytes: &[u8], filename: &str) -> ExtractedText {
        let page = ocr_page(ocr, bytes, 1);
        if page.degraded {
            let reason = page.reason.clone().unwrap_or_default();
            return ExtractedText::unavailable(filename, MediaKind::Image, reason);
        }
        ExtractedText {
            filename: filename.to_string(),
            media_kind: MediaKind::Image,
            method: ExtractionMethod::ImageOcr,
            text: page.text.clone(),
            pages: vec![page],
            degraded: false,
            degradation_reason: None,
        }
    }

    fn extract_pdf(&self, ocr: &dyn OcrEngine, bytes: &[u8], filename: &str) -> ExtractedText {
        let Some(renderer) = self.pdf_renderer.as_deref() else {
            tracing::warn!("No PDF renderer configured");
            return ExtractedText::unavailable(filename, MediaKind::Pdf, "PDF renderer unavailable");
        };

        let page_count = match renderer.page_count(bytes) {
            Ok(0) => {
                return ExtractedText::unavailable(filename, MediaKind::Pdf, "PDF has no pages");
            }
            Ok(n) => n,
            Err(e) => {
                tracing::warn!(error = %e, "PDF could not be opened");
                return ExtractedText::unavailable(
                    filename,
                    MediaKind::Pdf,
                    format!("unrenderable PDF: {e}"),
                );
            }
        };

        let mut reasons: Vec<String> = Vec::new();
        if page_count > MAX_PDF_PAGES {
            tracing::warn!(page_count, max = MAX_PDF_PAGES, "PDF truncated for OCR");
            reasons.push(format!("only the first {MAX_PDF_PAGES} of {page_count} pages were read"));
        }

        let pages: Vec<PageText> = (0..page_count.min(MAX_PDF_PAGES))
            .map(|index| {
                let page_number = index + 1;
                match renderer.render_page(bytes, index, self.render_dpi) {
                    Ok(png) => ocr_page(ocr, &png, page_number),
                    Err(e) => {
                        tracing::warn!(page = page_number, error = %e, "Page render failed");
                        PageText::degraded(page_number, format!("page render failed: {e}"))
                    }
                }
            })
            .collect();

        let degraded_pages: Vec<usize> = pages
            .iter()
            .filter(|p| p.degraded)
            .map(|p| p.page_number)
            .collect();
        if !degraded_pages.is_empty() {
            reasons.push(format!(
                "{} of {} pages unreadable: {:?}",
                degraded_pages.len(),
                pages.len(),
                degraded_pages
            ));
        }

        let text = pages
            .iter()
            .map(|p| format!("{}\n{}", page_marker(p.page_number), p.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let degraded = !reasons.is_empty();
        ExtractedText {
            filename: filename.to_string(),
            media_kind: MediaKind::Pdf,
            method: ExtractionMethod::PdfPageOcr,
            pages,
            text,
            degraded,
            degradation_reason: degraded.then(|| reasons.join("; ")),
        }
    }
}

/// OCR one image into a page block; failures and blank output degrade the page.
fn ocr_page(ocr: &dyn OcrEngine, image_bytes: &[u8], page_number: usize) -> PageText {
    match ocr.ocr_image(image_bytes) {
        Ok(result) => {
            let text = sanitize_extracted_text(&result.text);
            tracing::debug!(
                page = page_number,
                engine = ocr.name(),
                confidence = result.confidence,
                text_len = text.len(),
                "OCR page"
            );
            if text.is_empty() {
                PageText::degraded(page_number, "no legible text recognised")
            } else {
                PageText {
                    page_number,
                    text,
                    degraded: false,
                    reason: None,
                }
            }
        }
        Err(e) => {
            tracing::warn!(page = page_number, engine = ocr.name(), error = %e, "OCR failed");
            PageText::degraded(page_number, e.to_string())
        }
    }
}
