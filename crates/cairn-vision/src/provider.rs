//! Provider contract for image analysis.

use async_trait::async_trait;

/// Result of one provider's pass over an image.
///
/// Providers report failure as data rather than returning `Err`: a broken
/// or unreachable provider must produce the same deterministic shape on
/// every call so composition and persistence never have to special-case
/// a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisionOutcome {
    /// Text extracted from the image, empty when none was found.
    pub ocr_text: String,
    /// Labels describing the image content.
    pub labels: Vec<String>,
    /// Whether the provider produced a usable result.
    pub success: bool,
    /// Failure detail, empty on success.
    pub error: String,
}

impl VisionOutcome {
    /// A successful outcome with the given text and labels.
    pub fn success(ocr_text: impl Into<String>, labels: Vec<String>) -> Self {
        Self {
            ocr_text: ocr_text.into(),
            labels,
            success: true,
            error: String::new(),
        }
    }

    /// A failed outcome carrying only an error description.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            ocr_text: String::new(),
            labels: Vec::new(),
            success: false,
            error: error.into(),
        }
    }
}

/// Capability for extracting text and labels from an image.
///
/// Implementations include a fixed placeholder, an HTTP OCR backend, and
/// a composite that merges results from several providers. The composite
/// implements this trait itself, so providers nest.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    /// Provider name, used when aggregating failure messages.
    fn name(&self) -> &str;

    /// Analyze an image and report extracted text and labels.
    async fn analyze(&self, image: &[u8], content_type: &str) -> VisionOutcome;
}
