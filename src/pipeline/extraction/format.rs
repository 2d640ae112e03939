use crate::pipeline::types::MediaKind;

/// Magic-byte signatures, checked before the filename extension.
const PDF_MAGIC: &[u8] = b"%PDF";
const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
const TIFF_LE_MAGIC: &[u8] = &[0x49, 0x49, 0x2A, 0x00];
const TIFF_BE_MAGIC: &[u8] = &[0x4D, 0x4D, 0x00, 0x2A];
const GIF_MAGIC: &[u8] = b"GIF8";
const BMP_MAGIC: &[u8] = b"BM";

/// Detect the media kind from content first, filename second.
pub fn detect_media_kind(bytes: &[u8], filename: &str) -> MediaKind {
    match sniff_magic(bytes) {
        MediaKind::Unknown => MediaKind::from_filename(filename),
        kind => kind,
    }
}

fn sniff_magic(bytes: &[u8]) -> MediaKind {
    // Some producers prepend junk before the PDF header; the format
    // allows the header anywhere in the first 1024 bytes.
    let head = &bytes[..bytes.len().min(1024)];
    if head.windows(PDF_MAGIC.len()).any(|w| w == PDF_MAGIC) {
        return MediaKind::Pdf;
    }

    let is_image = [JPEG_MAGIC, PNG_MAGIC, TIFF_LE_MAGIC, TIFF_BE_MAGIC, GIF_MAGIC]
        .iter()
        .any(|magic| bytes.starts_with(magic))
        || is_webp(bytes)
        || (bytes.starts_with(BMP_MAGIC) && bytes.len() > 14);

    if is_image {
        MediaKind::Image
    } else {
        MediaKind::Unknown
    }
}

fn is_webp(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_pdf_by_magic() {
        assert_eq!(detect_media_kind(b"%PDF-1.7\n...", "upload.bin"), MediaKind::Pdf);
    }

    #[test]
    fn detects_pdf_header_after_junk() {
        let mut bytes = vec![0u8; 16];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert_eq!(detect_media_kind(&bytes, "x"), MediaKind::Pdf);
    }

    #[test]
    fn detects_images_by_magic() {
        assert_eq!(detect_media_kind(&[0xFF, 0xD8, 0xFF, 0xE0], "a"), MediaKind::Image);
        assert_eq!(
            detect_media_kind(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A], "a"),
            MediaKind::Image
        );
        assert_eq!(detect_media_kind(&[0x49, 0x49, 0x2A, 0x00, 0x08], "a"), MediaKind::Image);
        assert_eq!(detect_media_kind(b"RIFF\x00\x00\x00\x00WEBPVP8 ", "a"), MediaKind::Image);
    }

    #[test]
    fn magic_wins_over_extension() {
        assert_eq!(detect_media_kind(b"%PDF-1.5", "scan.jpg"), MediaKind::Pdf);
    }

    #[test]
    fn falls_back_to_extension() {
        assert_eq!(detect_media_kind(b"garbage", "statement.pdf"), MediaKind::Pdf);
        assert_eq!(detect_media_kind(b"garbage", "statement.png"), MediaKind::Image);
    }

    #[test]
    fn unknown_content_and_extension() {
        assert_eq!(detect_media_kind(b"plain words", "notes.txt"), MediaKind::Unknown);
        assert_eq!(detect_media_kind(&[], "empty"), MediaKind::Unknown);
    }
}
