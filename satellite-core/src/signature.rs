//! Archive wire-signature table and image-completeness byte checks.
//!
//! Grounded on `examples/original_source/satellite/utils/lanraragi/{validation,constants}.py`
//! and `satellite/utils/image.py`, adapted where the two disagree (e.g. the
//! shorter `pdf` prefix).

/// One entry of the signature table: a case-insensitive hex prefix and the
/// archive kind it identifies.
pub struct SignatureEntry {
    pub hex_prefix: &'static str,
    pub kind: &'static str,
}

/// The allowed signature table, matched as a prefix against the first 24
/// bytes of a candidate file.
pub const SIGNATURES: &[SignatureEntry] = &[
    SignatureEntry { hex_prefix: "504b0304", kind: "zip" },
    SignatureEntry { hex_prefix: "504b0506", kind: "zip" },
    SignatureEntry { hex_prefix: "504b0708", kind: "zip" },
    SignatureEntry { hex_prefix: "526172211a0700", kind: "rar" },
    SignatureEntry { hex_prefix: "526172211a070100", kind: "rar" },
    SignatureEntry { hex_prefix: "1f8b", kind: "tar.gz" },
    SignatureEntry { hex_prefix: "fd377a585a00", kind: "lzma" },
    SignatureEntry { hex_prefix: "377abcaf271c", kind: "7z" },
    SignatureEntry { hex_prefix: "2550444625", kind: "pdf" },
];

/// Extensions the discovery phase walks for.
pub const ALLOWED_EXTENSIONS: &[&str] = &[
    "zip", "rar", "tar.gz", "lzma", "7z", "xz", "cbz", "cbr", "pdf",
];

/// Render the first bytes of a file as lowercase hex, truncated to the
/// first 24 bytes (the candidate signature).
#[must_use]
pub fn signature_hex(bytes: &[u8]) -> String {
    let take = bytes.len().min(24);
    bytes[..take]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// True if `hex` (as produced by [`signature_hex`]) matches a known prefix.
#[must_use]
pub fn is_valid_signature_hex(hex: &str) -> bool {
    let hex = hex.to_ascii_lowercase();
    SIGNATURES.iter().any(|entry| hex.starts_with(entry.hex_prefix))
}

/// JPEG end-of-image marker.
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];
/// PNG `IEND` chunk, the last 8 bytes of a well-formed PNG.
const PNG_IEND: [u8; 8] = [0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82];

/// Outcome of a single image's completeness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCompleteness {
    Complete,
    Incomplete,
    /// Format not recognised by extension; caller decides how to treat it
    /// (the original source raises `TypeError` here; this treats it as
    /// CORRUPTED/ERROR rather than panicking).
    UnsupportedFormat,
}

/// Byte-level completeness check for one image member: zero-byte files
/// are incomplete; JPEGs must end `FF D9`; PNGs must end with the `IEND`
/// chunk bytes.
#[must_use]
pub fn image_completeness(filename: &str, bytes: &[u8]) -> ImageCompleteness {
    if bytes.is_empty() {
        return ImageCompleteness::Incomplete;
    }
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        if bytes.len() >= 2 && bytes[bytes.len() - 2..] == JPEG_EOI {
            ImageCompleteness::Complete
        } else {
            ImageCompleteness::Incomplete
        }
    } else if lower.ends_with(".png") {
        if bytes.len() >= 8 && bytes[bytes.len() - 8..] == PNG_IEND {
            ImageCompleteness::Complete
        } else {
            ImageCompleteness::Incomplete
        }
    } else {
        ImageCompleteness::UnsupportedFormat
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zip_signature_is_valid() {
        let bytes = [0x50, 0x4b, 0x03, 0x04, 0, 0, 0, 0];
        assert!(is_valid_signature_hex(&signature_hex(&bytes)));
    }

    #[test]
    fn junk_signature_is_invalid() {
        let bytes = [0xff; 8];
        assert!(!is_valid_signature_hex(&signature_hex(&bytes)));
    }

    #[test]
    fn jpeg_completeness() {
        let mut complete = vec![0u8; 100];
        complete[98] = 0xFF;
        complete[99] = 0xD9;
        assert_eq!(
            image_completeness("a.jpg", &complete),
            ImageCompleteness::Complete
        );

        let truncated = &complete[..50];
        assert_eq!(
            image_completeness("a.jpg", truncated),
            ImageCompleteness::Incomplete
        );
    }

    #[test]
    fn png_completeness() {
        let mut complete = vec![0u8; 40];
        let start = complete.len() - 8;
        complete[start..].copy_from_slice(&PNG_IEND);
        assert_eq!(
            image_completeness("a.png", &complete),
            ImageCompleteness::Complete
        );
    }

    #[test]
    fn empty_file_is_incomplete() {
        assert_eq!(
            image_completeness("a.jpg", &[]),
            ImageCompleteness::Incomplete
        );
    }
}
