//! PDF page rasterization via Google PDFium.
//!
//! `PdfiumRenderer` is stateless (`Send + Sync`). Each operation binds a
//! fresh `Pdfium` instance because the upstream type is `!Send`; the OS
//! caches the dynamic library load, so repeat binds are cheap.

use std::io::Cursor;
use std::path::PathBuf;

use image::ImageOutputFormat;
use pdfium_render::prelude::*;
use tracing::{debug, warn};

use super::types::PdfPageRenderer;
use super::ExtractionError;

/// Maximum dimension (width or height) for rendered page images.
/// Prevents OOM on extremely large pages or absurd DPI settings.
pub const MAX_DIMENSION_PX: u32 = 4096;

/// PDF points per inch (standard PDF unit).
const POINTS_PER_INCH: f32 = 72.0;

/// Renders PDF pages to PNG images using Google PDFium.
pub struct PdfiumRenderer;

impl PdfiumRenderer {
    /// Create a renderer, verifying the PDFium library is loadable.
    pub fn new() -> Result<Self, ExtractionError> {
        let _ = load_pdfium()?;
        Ok(Self)
    }
}

/// Load the PDFium dynamic library.
///
/// Discovery order:
/// 1. `PDFIUM_DYNAMIC_LIB_PATH` env var (explicit path to the library file)
/// 2. Alongside the running executable, then `<exe_dir>/lib`
/// 3. `~/NyayaDrishti/lib`
/// 4. System library search paths
fn load_pdfium() -> Result<Pdfium, ExtractionError> {
    if let Ok(path) = std::env::var("PDFIUM_DYNAMIC_LIB_PATH") {
        debug!(path = %path, "Loading PDFium from env var");
        let bindings = Pdfium::bind_to_library(&path).map_err(|e| ExtractionError::PdfRendering {
            page: 0,
            reason: format!("Failed to load PDFium from {path}: {e}"),
        })?;
        return Ok(Pdfium::new(bindings));
    }

    let mut candidates: Vec<PathBuf> = Vec::new();
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
    {
        candidates.push(exe_dir.clone());
        candidates.push(exe_dir.join("lib"));
    }
    candidates.push(crate::config::app_data_dir().join("lib"));

    for dir in &candidates {
        let lib_path = Pdfium::pdfium_platform_library_name_at_path(dir.to_string_lossy().as_ref());
        if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
            debug!(dir = %dir.display(), "Loaded PDFium from candidate directory");
            return Ok(Pdfium::new(bindings));
        }
    }

    let bindings = Pdfium::bind_to_system_library().map_err(|e| ExtractionError::PdfRendering {
        page: 0,
        reason: format!(
            "PDFium library not found. Set PDFIUM_DYNAMIC_LIB_PATH or install PDFium: {e}"
        ),
    })?;
    Ok(Pdfium::new(bindings))
}

/// Map PDF load errors; encrypted PDFs get their own variant.
fn map_load_error(e: PdfiumError) -> ExtractionError {
    let msg = format!("{e}");
    let lower = msg.to_lowercase();
    if lower.contains("password") || lower.contains("encrypt") {
        ExtractionError::PdfEncrypted
    } else {
        ExtractionError::PdfRendering {
            page: 0,
            reason: format!("Failed to load PDF: {e}"),
        }
    }
}

/// Compute pixel dimensions for rendering, applying the dimension guard.
///
/// Returns (width_px, height_px), both clamped to [1, MAX_DIMENSION_PX].
/// Preserves aspect ratio when capping.
pub fn compute_render_dimensions(width_points: f32, height_points: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / POINTS_PER_INCH;
    let raw_w = (width_points * scale).max(1.0);
    let raw_h = (height_points * scale).max(1.0);

    let max_dim = raw_w.max(raw_h);
    if max_dim > MAX_DIMENSION_PX as f32 {
        let ratio = MAX_DIMENSION_PX as f32 / max_dim;
        let w = ((raw_w * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        let h = ((raw_h * ratio) as u32).clamp(1, MAX_DIMENSION_PX);
        (w, h)
    } else {
        (raw_w as u32, raw_h as u32)
    }
}

impl PdfPageRenderer for PdfiumRenderer {
    fn page_count(&self, pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        Ok(document.pages().len() as usize)
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let pdfium = load_pdfium()?;
        let document = pdfium
            .load_pdf_from_byte_slice(pdf_bytes, None)
            .map_err(map_load_error)?;
        let pages = document.pages();

        let index = u16::try_from(page_index).map_err(|_| ExtractionError::PdfRendering {
            page: page_index,
            reason: format!("Page index {page_index} exceeds u16 maximum"),
        })?;

        let page = pages.get(index).map_err(|_| ExtractionError::PdfRendering {
            page: page_index,
            reason: format!("Page {page_index} out of range (document has {} pages)", pages.len()),
        })?;

        let width_points = page.width().value;
        let height_points = page.height().value;
        let (target_w, target_h) = compute_render_dimensions(width_points, height_points, dpi);

        let uncapped_w = (width_points * dpi as f32 / POINTS_PER_INCH) as u32;
        let uncapped_h = (height_points * dpi as f32 / POINTS_PER_INCH) as u32;
        if target_w != uncapped_w || target_h != uncapped_h {
            warn!(
                page = page_index,
                raw_width = uncapped_w,
                raw_height = uncapped_h,
                capped_width = target_w,
                capped_height = target_h,
                "Page dimensions capped to {MAX_DIMENSION_PX}px",
            );
        }

        let config = PdfRenderConfig::new()
            .set_target_width(target_w as i32)
            .set_maximum_height(target_h as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| ExtractionError::PdfRendering {
                page: page_index,
                reason: format!("Rendering failed: {e}"),
            })?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, ImageOutputFormat::Png)
            .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
        let png_bytes = cursor.into_inner();

        debug!(
            page = page_index,
            width = target_w,
            height = target_h,
            png_size = png_bytes.len(),
            "Rendered PDF page to PNG"
        );

        Ok(png_bytes)
    }
}

// ── Mock for testing ──────────────────────────────────────

/// Mock PDF page renderer returning a minimal PNG for each valid page.
/// Pages listed in `broken_pages` fail to render.
pub struct MockPdfPageRenderer {
    page_count: Result<usize, String>,
    broken_pages: Vec<usize>,
}

impl MockPdfPageRenderer {
    pub fn new(page_count: usize) -> Self {
        Self {
            page_count: Ok(page_count),
            broken_pages: Vec::new(),
        }
    }

    /// A document PDFium cannot open at all.
    pub fn unreadable(reason: &str) -> Self {
        Self {
            page_count: Err(reason.to_string()),
            broken_pages: Vec::new(),
        }
    }

    pub fn with_broken_page(mut self, page_index: usize) -> Self {
        self.broken_pages.push(page_index);
        self
    }
}

impl PdfPageRenderer for MockPdfPageRenderer {
    fn page_count(&self, _pdf_bytes: &[u8]) -> Result<usize, ExtractionError> {
        self.page_count.clone().map_err(|reason| ExtractionError::PdfRendering { page: 0, reason })
    }

    fn render_page(
        &self,
        pdf_bytes: &[u8],
        page_index: usize,
        _dpi: u32,
    ) -> Result<Vec<u8>, ExtractionError> {
        let count = self.page_count(pdf_bytes)?;
        if page_index >= count || self.broken_pages.contains(&page_index) {
            return Err(ExtractionError::PdfRendering {
                page: page_index,
                reason: format!("Page {page_index} cannot be rendered (mock has {count} pages)"),
            });
        }
        Ok(minimal_png())
    }
}

/// Minimal valid 1x1 white pixel PNG for mock testing.
fn minimal_png() -> Vec<u8> {
    vec![
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, // PNG signature
        0x00, 0x00, 0x00, 0x0D, 0x49, 0x48, 0x44, 0x52, // IHDR chunk
        0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, // 1x1
        0x08, 0x02, 0x00, 0x00, 0x00, 0x90, 0x77, 0x53, // 8-bit RGB
        0xDE, // IHDR CRC
        0x00, 0x00, 0x00, 0x0C, 0x49, 0x44, 0x41, 0x54, // IDAT chunk
        0x08, 0xD7, 0x63, 0xF8, 0xCF, 0xC0, 0x00, 0x00, // compressed
        0x00, 0x02, 0x00, 0x01, 0xE2, 0x21, 0xBC, 0x33, // IDAT CRC
        0x00, 0x00, 0x00, 0x00, 0x49, 0x45, 0x4E, 0x44, // IEND chunk
        0xAE, 0x42, 0x60, 0x82, // IEND CRC
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_at_300dpi() {
        let (w, h) = compute_render_dimensions(595.0, 842.0, 300);
        assert!(w > 2400 && w < 2550, "A4 width at 300dpi: got {w}");
        assert!(h > 3450 && h < 3600, "A4 height at 300dpi: got {h}");
    }

    #[test]
    fn legal_at_300dpi_is_capped() {
        // US Legal = 612 x 1008 points -> 2550 x 4200 at 300 DPI
        let (w, h) = compute_render_dimensions(612.0, 1008.0, 300);
        assert!(h >= MAX_DIMENSION_PX - 1 && h <= MAX_DIMENSION_PX, "Legal height: got {h}");
        assert!(w < 2550 && w > 2400, "Legal width capped proportionally: got {w}");
    }

    #[test]
    fn dimension_guard_preserves_aspect_ratio() {
        let (w, h) = compute_render_dimensions(5000.0, 10000.0, 300);
        let ratio = h as f32 / w as f32;
        assert!((ratio - 2.0).abs() < 0.15, "Aspect ratio should be ~2:1, got {ratio}");
        assert!(w <= MAX_DIMENSION_PX && h <= MAX_DIMENSION_PX);
    }

    #[test]
    fn zero_points_clamped_to_1() {
        let (w, h) = compute_render_dimensions(0.0, 0.0, 300);
        assert!(w >= 1 && h >= 1);
    }

    #[test]
    fn single_dimension_oversized() {
        let (w, h) = compute_render_dimensions(20000.0, 100.0, 300);
        assert!(w <= MAX_DIMENSION_PX, "Width {w} exceeds limit");
        assert!(h >= 1);
    }

    #[test]
    fn mock_returns_png_for_valid_page() {
        let png = MockPdfPageRenderer::new(3).render_page(&[], 0, 300).unwrap();
        assert_eq!(&png[..4], &[0x89, 0x50, 0x4E, 0x47]);
    }

    #[test]
    fn mock_errors_for_out_of_range_and_broken_pages() {
        let mock = MockPdfPageRenderer::new(3).with_broken_page(1);
        assert!(mock.render_page(&[], 0, 300).is_ok());
        assert!(matches!(
            mock.render_page(&[], 1, 300),
            Err(ExtractionError::PdfRendering { page: 1, .. })
        ));
        assert!(mock.render_page(&[], 3, 300).is_err());
    }

    #[test]
    fn unreadable_mock_fails_page_count() {
        let mock = MockPdfPageRenderer::unreadable("xref table corrupt");
        assert!(mock.page_count(&[]).is_err());
    }

    #[test]
    fn encrypted_error_detection_message() {
        assert_eq!(
            ExtractionError::PdfEncrypted.to_string(),
            "PDF is password-protected or encrypted"
        );
    }
}
