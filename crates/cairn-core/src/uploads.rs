//! Image upload validation.
//!
//! Two checks, in order: byte size against the configured maximum, then the
//! declared content type against the image allow-list. Both produce specific
//! messages and run before any record mutation, so a rejected upload leaves
//! the note's prior attachment untouched.

use crate::defaults::{ALLOWED_IMAGE_TYPES, FILENAME_MAX_LENGTH};

/// Result of upload validation.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub allowed: bool,
    pub block_reason: Option<String>,
}

impl ValidationResult {
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            block_reason: None,
        }
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            block_reason: Some(reason.into()),
        }
    }
}

/// Validate an image upload's size and declared content type.
///
/// Size is checked first; each violation carries its own message.
pub fn validate_image(content_type: &str, size_bytes: usize, max_size_bytes: usize) -> ValidationResult {
    if size_bytes > max_size_bytes {
        return ValidationResult::blocked(format!(
            "Image file too large. Maximum size is {} MB.",
            max_size_bytes / (1024 * 1024)
        ));
    }

    if !ALLOWED_IMAGE_TYPES.contains(&content_type) {
        return ValidationResult::blocked(format!(
            "Invalid image type. Allowed types: {}.",
            ALLOWED_IMAGE_TYPES.join(", ")
        ));
    }

    ValidationResult::allowed()
}

/// Detect the actual content type from magic bytes.
///
/// Returns the sniffed MIME type when the payload matches a known format.
/// A claimed binary type whose magic bytes don't check out downgrades to
/// `application/octet-stream`; text-like claims pass through (they have no
/// magic bytes to verify).
pub fn detect_content_type(data: &[u8], claimed: &str) -> String {
    if let Some(kind) = infer::get(data) {
        return kind.mime_type().to_string();
    }

    if claimed_is_binary(claimed) {
        return "application/octet-stream".to_string();
    }

    claimed.to_string()
}

/// A claimed MIME type that should carry recognizable magic bytes.
fn claimed_is_binary(claimed: &str) -> bool {
    claimed.starts_with("image/")
        || claimed.starts_with("audio/")
        || claimed.starts_with("video/")
        || matches!(claimed, "application/pdf" | "application/zip" | "application/gzip")
}

/// Sanitize a filename for safe storage.
///
/// Strips path components, replaces control and reserved characters, and
/// truncates to the filesystem limit preserving the extension.
pub fn sanitize_filename(filename: &str) -> String {
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);

    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.is_empty() {
        return "unnamed_image".to_string();
    }

    if sanitized.len() > FILENAME_MAX_LENGTH {
        if let Some(dot_pos) = sanitized.rfind('.') {
            let ext = &sanitized[dot_pos..];
            if ext.len() < FILENAME_MAX_LENGTH {
                let stem = &sanitized[..FILENAME_MAX_LENGTH - ext.len()];
                return format!("{}{}", stem, ext);
            }
        }
        return sanitized[..FILENAME_MAX_LENGTH].to_string();
    }

    sanitized.to_string()
}
