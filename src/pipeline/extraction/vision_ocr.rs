//! Vision OCR engine: extracts text from document images via an Ollama
//! vision model.
//!
//! Two prompt strategies:
//! - **DeepSeek-OCR**: `<|grounding|>` token, no system prompt
//! - **Generic vision models**: system prompt + transcription instruction
//!
//! Both ask the model to answer exactly `[BLANK]` when a page carries no
//! legible text, which the engine maps to an empty result.

use std::sync::Arc;

use base64::Engine as _;

use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;
use crate::ollama::VisionClient;

// ──────────────────────────────────────────────
// Constants
// ──────────────────────────────────────────────

const BLANK_TAG: &str = "[BLANK]";

const DEEPSEEK_OCR_PROMPT: &str = "\
<|grounding|>Transcribe all text in this document verbatim.\n\
If the page has no legible text, answer exactly [BLANK].";

const GENERIC_SYSTEM_PROMPT: &str = "\
You transcribe scanned police and court documents: first information reports, \
witness statements, complaints and annexures. Reproduce the text exactly as written, \
in its original script and language. Do not summarise, translate or correct it.";

const GENERIC_USER_PROMPT: &str = "\
Transcribe every line of visible text from this page, top to bottom, preserving \
times, dates, names and places exactly. Output plain text only. \
If the page has no legible text, answer exactly [BLANK].";

// ──────────────────────────────────────────────
// OllamaVisionOcr
// ──────────────────────────────────────────────

/// Production OCR engine backed by an Ollama vision model.
pub struct OllamaVisionOcr {
    vision_client: Arc<dyn VisionClient>,
    model_name: String,
}

impl OllamaVisionOcr {
    pub fn new(vision_client: Arc<dyn VisionClient>, model_name: String) -> Self {
        Self {
            vision_client,
            model_name,
        }
    }

    fn is_deepseek_ocr(&self) -> bool {
        model_component(&self.model_name).starts_with("deepseek-ocr")
    }
}

impl OcrEngine for OllamaVisionOcr {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let _span = tracing::info_span!(
            "vision_ocr",
            model = %self.model_name,
            image_size = image_bytes.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let images = vec![base64::engine::general_purpose::STANDARD.encode(image_bytes)];

        let (prompt, system) = if self.is_deepseek_ocr() {
            (DEEPSEEK_OCR_PROMPT, None)
        } else {
            (GENERIC_USER_PROMPT, Some(GENERIC_SYSTEM_PROMPT))
        };

        let raw_response = self
            .vision_client
            .chat_with_images(&self.model_name, prompt, &images, system)
            .map_err(|e| ExtractionError::OcrProcessing(format!("Vision OCR failed: {e}")))?;

        let text = strip_blank_tag(&raw_response);
        let confidence = compute_heuristic_confidence(&text);

        tracing::debug!(
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            confidence,
            "Vision OCR page complete"
        );

        Ok(OcrPageResult { text, confidence })
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

/// `"org/deepseek-ocr:latest"` → `"deepseek-ocr"`, lower-cased.
fn model_component(model_name: &str) -> String {
    let without_namespace = model_name.rsplit('/').next().unwrap_or(model_name);
    without_namespace
        .split(':')
        .next()
        .unwrap_or(without_namespace)
        .to_lowercase()
}

/// Remove the blank-page tag; a response that is only the tag is empty text.
fn strip_blank_tag(response: &str) -> String {
    let trimmed = response.trim();
    if trimmed == BLANK_TAG {
        return String::new();
    }
    trimmed
        .strip_suffix(BLANK_TAG)
        .unwrap_or(trimmed)
        .trim()
        .to_string()
}

/// Vision models report no per-word confidence; estimate from output length.
/// 0 chars → 0.0, <50 → 0.2, <200 → 0.4, <500 → 0.6, otherwise 0.8.
fn compute_heuristic_confidence(text: &str) -> f32 {
    match text.chars().count() {
        0 => 0.0,
        n if n < 50 => 0.2,
        n if n < 200 => 0.4,
        n if n < 500 => 0.6,
        _ => 0.8,
    }
}
