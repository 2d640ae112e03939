use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;

/// OCR engine used when no vision model is configured. Every call fails
/// with `OcrUnavailable`, which the extractor turns into degraded output.
pub struct UnavailableOcr;

impl OcrEngine for UnavailableOcr {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        Err(ExtractionError::OcrUnavailable)
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

/// Mock OCR engine for unit testing without a vision model.
///
/// Responses are served in order, one per call; the last response repeats
/// once the script is exhausted.
pub struct MockOcrEngine {
    responses: Vec<Result<String, String>>,
    confidence: f32,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            responses: vec![Ok(text.to_string())],
            confidence,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every call fails with an OCR processing error.
    pub fn failing(reason: &str) -> Self {
        Self {
            responses: vec![Err(reason.to_string())],
            confidence: 0.0,
            calls: AtomicUsize::new(0),
        }
    }

    /// Scripted per-call responses (e.g. one per PDF page).
    pub fn scripted(responses: Vec<Result<String, String>>) -> Self {
        Self {
            responses,
            confidence: 0.8,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let response = self
            .responses
            .get(call)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_else(|| Err("no scripted response".to_string()));

        match response {
            Ok(text) => Ok(OcrPageResult {
                text,
                confidence: self.confidence,
            }),
            Err(reason) => Err(ExtractionError::OcrProcessing(reason)),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_ocr_returns_configured_text() {
        let engine = MockOcrEngine::new("At 10 AM near the Market", 0.9);
        let result = engine.ocr_image(&[]).unwrap();
        assert_eq!(result.text, "At 10 AM near the Market");
        assert!((result.confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn failing_mock_reports_processing_error() {
        let engine = MockOcrEngine::failing("model crashed");
        let err = engine.ocr_image(&[]).unwrap_err();
        assert!(matches!(err, ExtractionError::OcrProcessing(ref r) if r == "model crashed"));
    }

    #[test]
    fn scripted_mock_serves_in_order_then_repeats_last() {
        let engine = MockOcrEngine::scripted(vec![
            Ok("page one".into()),
            Err("blurred".into()),
            Ok("page three".into()),
        ]);
        assert_eq!(engine.ocr_image(&[]).unwrap().text, "page one");
        assert!(engine.ocr_image(&[]).is_err());
        assert_eq!(engine.ocr_image(&[]).unwrap().text, "page three");
        assert_eq!(engine.ocr_image(&[]).unwrap().text, "page three");
        assert_eq!(engine.call_count(), 4);
    }

    #[test]
    fn unavailable_ocr_always_errors() {
        assert!(matches!(
            UnavailableOcr.ocr_image(b"img"),
            Err(ExtractionError::OcrUnavailable)
        ));
        assert_eq!(UnavailableOcr.name(), "unavailable");
    }
}
