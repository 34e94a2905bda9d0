//! Composite provider that merges results from several providers.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::provider::{VisionOutcome, VisionProvider};

/// Runs every configured provider against the same image and merges the
/// results.
///
/// Text blocks concatenate in provider-list order separated by a blank
/// line; labels union into a sorted, deduplicated set. The merged call
/// succeeds when at least one provider succeeded, but individual failure
/// messages are kept in `error` either way so partial failures stay
/// visible.
pub struct CompositeProvider {
    providers: Vec<Arc<dyn VisionProvider>>,
}

impl CompositeProvider {
    pub fn new(providers: Vec<Arc<dyn VisionProvider>>) -> Self {
        Self { providers }
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

#[async_trait]
impl VisionProvider for CompositeProvider {
    fn name(&self) -> &str {
        "CompositeProvider"
    }

    async fn analyze(&self, image: &[u8], content_type: &str) -> VisionOutcome {
        let mut texts: Vec<String> = Vec::new();
        let mut labels: BTreeSet<String> = BTreeSet::new();
        let mut errors: Vec<String> = Vec::new();

        for provider in &self.providers {
            let outcome = provider.analyze(image, content_type).await;
            if outcome.success {
                if !outcome.ocr_text.is_empty() {
                    texts.push(outcome.ocr_text);
                }
                labels.extend(outcome.labels);
            } else {
                warn!(
                    subsystem = "vision",
                    provider = provider.name(),
                    error = %outcome.error,
                    "Provider failed during composite analysis"
                );
                errors.push(format!("{}: {}", provider.name(), outcome.error));
            }
        }

        VisionOutcome {
            ocr_text: texts.join("\n\n"),
            labels: labels.into_iter().collect(),
            success: errors.len() < self.providers.len(),
            error: errors.join("; "),
        }
    }
}
