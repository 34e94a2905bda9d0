//! Image analysis handler: drives one attachment from `processing` to a
//! terminal status.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use cairn_core::{AttachmentRepository, Error};
use cairn_db::Database;
use cairn_vision::VisionProvider;

use crate::handler::{AnalysisHandler, RunContext, RunResult};

/// Runs the configured vision provider against a claimed attachment and
/// persists the outcome.
///
/// The attachment record holds the user-visible outcome; the run row only
/// tracks execution. A provider failure is therefore a *successful* run
/// with a failed outcome recorded, never a retry.
pub struct ImageAnalysisHandler {
    db: Database,
    provider: Arc<dyn VisionProvider>,
}

impl ImageAnalysisHandler {
    pub fn new(db: Database, provider: Arc<dyn VisionProvider>) -> Self {
        Self { db, provider }
    }

    /// Record a failed outcome on the attachment.
    ///
    /// A vanished record is the abandon path and still counts as a finished
    /// run; only a fault while recording reports `Failed` to the queue.
    async fn record_failure(&self, ctx: &RunContext, detail: &str) -> RunResult {
        let attachment_id = ctx.attachment_id();
        match self.db.attachments.fail(attachment_id, detail).await {
            Ok(()) => {
                warn!(
                    subsystem = "jobs",
                    %attachment_id,
                    run_id = %ctx.run.id,
                    error = %detail,
                    "Analysis failed"
                );
                RunResult::Success
            }
            Err(Error::AttachmentNotFound(_)) => {
                info!(
                    subsystem = "jobs",
                    %attachment_id,
                    run_id = %ctx.run.id,
                    "Attachment gone before failure could be recorded, abandoning run"
                );
                RunResult::Success
            }
            Err(e) => {
                error!(
                    subsystem = "jobs",
                    %attachment_id,
                    run_id = %ctx.run.id,
                    error = %e,
                    "Could not record analysis failure"
                );
                RunResult::Failed(format!("Failed to record analysis failure: {}", e))
            }
        }
    }
}

#[async_trait]
impl AnalysisHandler for ImageAnalysisHandler {
    async fn execute(&self, ctx: RunContext) -> RunResult {
        let attachment_id = ctx.attachment_id();

        // Claim the attachment for this run. A vanished or already-settled
        // record means the run is stale (the attachment was replaced or
        // deleted since enqueue); abandon without error.
        match self.db.attachments.mark_processing(attachment_id).await {
            Ok(()) => {}
            Err(Error::AttachmentNotFound(_)) => {
                info!(
                    subsystem = "jobs",
                    %attachment_id,
                    run_id = %ctx.run.id,
                    "Attachment gone or already settled, abandoning run"
                );
                return RunResult::Success;
            }
            Err(e) => {
                return RunResult::Failed(format!("Failed to mark attachment processing: {}", e));
            }
        }

        // From here the record is in `processing` and every exit must leave
        // it terminal, or the attachment would show as in-flight forever.
        let (bytes, content_type, filename) =
            match self.db.attachments.download(attachment_id).await {
                Ok(t) => t,
                Err(e) => {
                    return self
                        .record_failure(&ctx, &format!("Failed to load image bytes: {}", e))
                        .await;
                }
            };

        info!(
            subsystem = "jobs",
            %attachment_id,
            run_id = %ctx.run.id,
            filename = %filename,
            size_bytes = bytes.len(),
            "Analyzing image"
        );

        let outcome = self.provider.analyze(&bytes, &content_type).await;

        if outcome.success {
            match self
                .db
                .attachments
                .complete(attachment_id, &outcome.ocr_text, &outcome.labels)
                .await
            {
                Ok(()) => {
                    info!(
                        subsystem = "jobs",
                        %attachment_id,
                        run_id = %ctx.run.id,
                        chars = outcome.ocr_text.len(),
                        labels = outcome.labels.len(),
                        "Analysis complete"
                    );
                    RunResult::Success
                }
                Err(Error::AttachmentNotFound(_)) => {
                    info!(
                        subsystem = "jobs",
                        %attachment_id,
                        run_id = %ctx.run.id,
                        "Attachment gone before result could be recorded, abandoning run"
                    );
                    RunResult::Success
                }
                Err(e) => {
                    error!(
                        subsystem = "jobs",
                        %attachment_id,
                        run_id = %ctx.run.id,
                        error = %e,
                        "Could not record analysis result"
                    );
                    RunResult::Failed(format!("Failed to record analysis result: {}", e))
                }
            }
        } else {
            self.record_failure(&ctx, &outcome.error).await
        }
    }
}
