//! Analysis run handler contract.

use async_trait::async_trait;
use uuid::Uuid;

use cairn_core::AnalysisRun;

/// Context provided to analysis handlers.
pub struct RunContext {
    /// The claimed run being processed.
    pub run: AnalysisRun,
}

impl RunContext {
    /// Create a new run context.
    pub fn new(run: AnalysisRun) -> Self {
        Self { run }
    }

    /// Get the attachment this run targets.
    pub fn attachment_id(&self) -> Uuid {
        self.run.attachment_id
    }
}

/// Result of executing a run.
///
/// `Success` means the execution finished with its outcome recorded on the
/// attachment, including a recorded analysis failure and the abandon path
/// for vanished attachments. `Failed` is reserved for infrastructure
/// faults where a retry of the whole run can genuinely recover.
#[derive(Debug)]
pub enum RunResult {
    /// Run finished; any outcome is already persisted on the attachment.
    Success,
    /// Run could not finish; the queue may retry it.
    Failed(String),
}

/// Trait for analysis run handlers.
#[async_trait]
pub trait AnalysisHandler: Send + Sync {
    /// Execute the run.
    async fn execute(&self, ctx: RunContext) -> RunResult;
}

/// No-op handler for testing.
pub struct NoOpHandler;

#[async_trait]
impl AnalysisHandler for NoOpHandler {
    async fn execute(&self, _ctx: RunContext) -> RunResult {
        RunResult::Success
    }
}
