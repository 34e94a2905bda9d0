//! Placeholder provider used when no real analysis backend is configured.

use async_trait::async_trait;
use tracing::debug;

use crate::provider::{VisionOutcome, VisionProvider};

/// Notice text stored in place of real OCR output.
pub const PLACEHOLDER_NOTICE: &str =
    "[OCR not configured - install an OCR provider for real text extraction]";

/// Always succeeds with a fixed notice and generic labels.
///
/// Stands in when no OCR backend is installed, so attachments still move
/// through the full pending/processing/completed lifecycle.
pub struct PlaceholderProvider;

#[async_trait]
impl VisionProvider for PlaceholderProvider {
    fn name(&self) -> &str {
        "PlaceholderProvider"
    }

    async fn analyze(&self, image: &[u8], content_type: &str) -> VisionOutcome {
        debug!(
            subsystem = "vision",
            provider = self.name(),
            size_bytes = image.len(),
            content_type,
            "Returning placeholder analysis"
        );
        VisionOutcome::success(
            PLACEHOLDER_NOTICE,
            vec!["image".to_string(), "photo".to_string()],
        )
    }
}
