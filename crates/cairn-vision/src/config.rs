//! Provider set construction from deployment configuration.

use std::sync::Arc;

use tracing::info;

use crate::composite::CompositeProvider;
use crate::ocr_http::HttpOcrProvider;
use crate::placeholder::PlaceholderProvider;
use crate::provider::VisionProvider;

/// Build the analysis provider from the environment.
///
/// Called once at startup; the result is handed to the worker rather than
/// looked up through a global. Installs the OCR backend when
/// `VISION_OCR_URL` is set and falls back to the placeholder otherwise,
/// always wrapped in a composite so the merge and error-aggregation path
/// is the only path.
pub fn provider_from_env() -> Arc<dyn VisionProvider> {
    let mut providers: Vec<Arc<dyn VisionProvider>> = Vec::new();

    if let Some(ocr) = HttpOcrProvider::from_env() {
        info!(
            subsystem = "vision",
            model = ocr.model_name(),
            "OCR provider installed"
        );
        providers.push(Arc::new(ocr));
    }

    if providers.is_empty() {
        info!(
            subsystem = "vision",
            "No vision endpoint configured, using placeholder analysis"
        );
        providers.push(Arc::new(PlaceholderProvider));
    }

    Arc::new(CompositeProvider::new(providers))
}
