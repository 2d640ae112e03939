pub mod format;
pub mod ocr;
pub mod orchestrator;
pub mod pdfium;
pub mod sanitize;
pub mod types;
pub mod vision_ocr;

pub use format::*;
pub use ocr::*;
pub use orchestrator::*;
pub use sanitize::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("OCR engine unavailable")]
    OcrUnavailable,

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("PDF rendering failed on page {page}: {reason}")]
    PdfRendering { page: usize, reason: String },

    #[error("PDF is password-protected or encrypted")]
    PdfEncrypted,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Unsupported format for extraction")]
    UnsupportedFormat,

    #[error("Document is empty")]
    EmptyInput,
}
