use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::pipeline::types::MediaKind;

/// Prefix of the body emitted when no real text could be produced.
pub const PLACEHOLDER_PREFIX: &str = "[text unavailable: ";

/// Explicit placeholder body for a degraded page or document.
pub fn placeholder(reason: &str) -> String {
    format!("{PLACEHOLDER_PREFIX}{reason}]")
}

/// Boundary marker emitted before each PDF page.
pub fn page_marker(page_number: usize) -> String {
    format!("--- Page {page_number} ---")
}

/// How text was extracted
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    ImageOcr,
    PdfPageOcr,
    /// Nothing could be extracted; the body is a placeholder.
    Unavailable,
}

/// Per-page extraction result. `page_number` is 1-based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageText {
    pub page_number: usize,
    pub text: String,
    pub degraded: bool,
    pub reason: Option<String>,
}

impl PageText {
    pub fn degraded(page_number: usize, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            page_number,
            text: placeholder(&reason),
            degraded: true,
            reason: Some(reason),
        }
    }
}

/// Text extracted from one document. Never empty-and-unmarked: when no real
/// content exists, `text` is a placeholder and `degraded` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedText {
    pub filename: String,
    pub media_kind: MediaKind,
    pub method: ExtractionMethod,
    pub pages: Vec<PageText>,
    pub text: String,
    pub degraded: bool,
    pub degradation_reason: Option<String>,
}

impl ExtractedText {
    /// Whole-document degradation with a single placeholder page.
    pub fn unavailable(filename: &str, media_kind: MediaKind, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            filename: filename.to_string(),
            media_kind,
            method: ExtractionMethod::Unavailable,
            pages: vec![PageText::degraded(1, reason.clone())],
            text: placeholder(&reason),
            degraded: true,
            degradation_reason: Some(reason),
        }
    }

    /// True when at least one page carries recognised text.
    pub fn has_content(&self) -> bool {
        self.pages.iter().any(|p| !p.degraded)
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

/// Raw OCR result from the engine
#[derive(Debug, Clone)]
pub struct OcrPageResult {
    pub text: String,
    pub confidence: f32,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine: Send + Sync {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;

    /// Engine label for logs.
    fn name(&self) -> &str;
}

/// Renders individual PDF pages to PNG images for OCR.
pub trait PdfPageRenderer: Send + Sync {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError>;

    /// `page_index` is 0-based.
    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError>;
}
