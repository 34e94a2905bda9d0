//! Analysis worker: claims queued runs and executes them concurrently.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use cairn_core::{defaults, AnalysisQueue, AnalysisRun, AttachmentRepository, Result};
use cairn_db::Database;

use crate::handler::{AnalysisHandler, RunContext, RunResult};
use crate::DEFAULT_POLL_INTERVAL_MS;

/// Configuration for the analysis worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Safety-net polling interval in milliseconds.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent runs.
    pub max_concurrent: usize,
    /// Per-run timeout in seconds.
    pub run_timeout_secs: u64,
    /// Whether to enable run processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_concurrent: defaults::ANALYSIS_MAX_CONCURRENT,
            run_timeout_secs: defaults::ANALYSIS_TIMEOUT_SECS,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `ANALYSIS_WORKER_ENABLED` | `true` | Enable/disable run processing |
    /// | `ANALYSIS_MAX_CONCURRENT` | `4` | Max concurrent runs |
    /// | `ANALYSIS_POLL_INTERVAL_MS` | `60000` | Safety-net poll interval |
    /// | `ANALYSIS_TIMEOUT_SECS` | `300` | Per-run timeout |
    pub fn from_env() -> Self {
        let enabled = std::env::var("ANALYSIS_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent = defaults::env_usize(
            defaults::ENV_ANALYSIS_MAX_CONCURRENT,
            defaults::ANALYSIS_MAX_CONCURRENT,
        )
        .max(1);

        let poll_interval_ms = defaults::env_u64(
            defaults::ENV_ANALYSIS_POLL_INTERVAL_MS,
            DEFAULT_POLL_INTERVAL_MS,
        );

        let run_timeout_secs = defaults::env_u64(
            defaults::ENV_ANALYSIS_TIMEOUT_SECS,
            defaults::ANALYSIS_TIMEOUT_SECS,
        );

        Self {
            poll_interval_ms,
            max_concurrent,
            run_timeout_secs,
            enabled,
        }
    }

    /// Create a new config with custom poll interval.
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    /// Set maximum concurrent runs.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Set the per-run timeout.
    pub fn with_run_timeout(mut self, secs: u64) -> Self {
        self.run_timeout_secs = secs;
        self
    }

    /// Enable or disable run processing.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the analysis worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    /// A run was started.
    RunStarted { run_id: Uuid, attachment_id: Uuid },
    /// A run completed successfully.
    RunCompleted { run_id: Uuid, attachment_id: Uuid },
    /// A run failed.
    RunFailed {
        run_id: Uuid,
        attachment_id: Uuid,
        error: String,
    },
    /// Worker started.
    WorkerStarted,
    /// Worker stopped.
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    ///
    /// In-flight runs drain before the worker loop exits.
    pub async fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| cairn_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Worker that processes analysis runs from the queue.
pub struct AnalysisWorker {
    db: Database,
    config: WorkerConfig,
    handler: Arc<dyn AnalysisHandler>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl AnalysisWorker {
    /// Create a new analysis worker.
    pub fn new(db: Database, config: WorkerConfig, handler: Arc<dyn AnalysisHandler>) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::WORKER_EVENT_CAPACITY);
        Self {
            db,
            config,
            handler,
            event_tx,
        }
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let worker = Arc::new(self);
        tokio::spawn(async move {
            worker.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop with concurrent run processing.
    ///
    /// Claims up to `max_concurrent` runs at a time and processes them as a
    /// batch. When the queue is empty it sleeps until an enqueue notifies
    /// it, with the poll interval as a safety net for wakes that land
    /// between a failed claim and the wait registering.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Analysis worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent,
            run_timeout_secs = self.config.run_timeout_secs,
            "Analysis worker started"
        );

        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        // The queue is persistent, so runs enqueued before a restart are
        // still waiting for us.
        match self.db.queue.pending_count().await {
            Ok(backlog) if backlog > 0 => {
                info!(backlog, "Resuming with queued analysis runs");
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "Failed to read queue backlog"),
        }

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let max_concurrent = self.config.max_concurrent;
        let notify = self.db.queue.run_notify();

        loop {
            // Check for shutdown before claiming runs
            if shutdown_rx.try_recv().is_ok() {
                info!("Analysis worker received shutdown signal");
                break;
            }

            // Claim up to max_concurrent runs
            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..max_concurrent {
                match self.claim_run().await {
                    Some(run) => {
                        claimed += 1;
                        let worker = self.clone_refs();
                        tasks.spawn(async move {
                            worker.execute_run(run).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                // Queue empty. Wait for an enqueue or the safety-net poll.
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Analysis worker received shutdown signal");
                        break;
                    }
                    _ = notify.notified() => {}
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing analysis batch");
                // Wait for all claimed runs to complete
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Analysis task panicked");
                    }
                }
                // No sleep, immediately try to claim more runs
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Analysis worker stopped");
    }

    /// Claim the next available run without processing it.
    async fn claim_run(&self) -> Option<AnalysisRun> {
        match self.db.queue.claim_next().await {
            Ok(Some(run)) => Some(run),
            Ok(None) => None,
            Err(e) => {
                error!(error = ?e, "Failed to claim run");
                None
            }
        }
    }

    /// Clone references needed for spawned run tasks.
    fn clone_refs(&self) -> AnalysisWorkerRef {
        AnalysisWorkerRef {
            db: self.db.clone(),
            handler: self.handler.clone(),
            event_tx: self.event_tx.clone(),
            run_timeout_secs: self.config.run_timeout_secs,
        }
    }
}

/// Lightweight reference bundle for executing a single run in a spawned task.
struct AnalysisWorkerRef {
    db: Database,
    handler: Arc<dyn AnalysisHandler>,
    event_tx: broadcast::Sender<WorkerEvent>,
    run_timeout_secs: u64,
}

impl AnalysisWorkerRef {
    /// Execute a single claimed run.
    async fn execute_run(self, run: AnalysisRun) {
        let start = Instant::now();
        let run_id = run.id;
        let attachment_id = run.attachment_id;

        info!(
            subsystem = "jobs",
            %run_id,
            %attachment_id,
            "Processing analysis run"
        );

        let _ = self.event_tx.send(WorkerEvent::RunStarted {
            run_id,
            attachment_id,
        });

        let run_timeout = Duration::from_secs(self.run_timeout_secs);
        let ctx = RunContext::new(run);
        let result = match tokio::time::timeout(run_timeout, self.handler.execute(ctx)).await {
            Ok(result) => result,
            Err(_) => {
                let message = format!(
                    "Analysis run exceeded timeout of {}s",
                    self.run_timeout_secs
                );
                warn!(subsystem = "jobs", %run_id, %attachment_id, "{}", message);
                // The handler future was dropped mid-flight and may have
                // left the attachment in processing. Make the timeout its
                // recorded outcome.
                if let Err(e) = self.db.attachments.fail(attachment_id, &message).await {
                    debug!(
                        subsystem = "jobs",
                        %attachment_id,
                        error = %e,
                        "Timeout outcome not recorded on attachment"
                    );
                }
                RunResult::Failed(message)
            }
        };

        match result {
            RunResult::Success => {
                if let Err(e) = self.db.queue.complete(run_id).await {
                    error!(error = %e, %run_id, "Failed to mark run as completed");
                } else {
                    info!(
                        subsystem = "jobs",
                        %run_id,
                        %attachment_id,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Run completed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::RunCompleted {
                        run_id,
                        attachment_id,
                    });
                }
            }
            RunResult::Failed(error) => {
                if let Err(e) = self.db.queue.fail(run_id, &error).await {
                    error!(error = %e, %run_id, "Failed to mark run as failed");
                } else {
                    warn!(
                        subsystem = "jobs",
                        %run_id,
                        %attachment_id,
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Run failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::RunFailed {
                        run_id,
                        attachment_id,
                        error,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(config.max_concurrent, 4);
        assert_eq!(config.run_timeout_secs, 300);
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_poll_interval(1000)
            .with_max_concurrent(8)
            .with_run_timeout(30)
            .with_enabled(false);

        assert_eq!(config.poll_interval_ms, 1000);
        assert_eq!(config.max_concurrent, 8);
        assert_eq!(config.run_timeout_secs, 30);
        assert!(!config.enabled);
    }

    #[test]
    fn test_worker_config_builder_preserves_other_fields() {
        let config = WorkerConfig::default().with_max_concurrent(16);
        assert_eq!(config.max_concurrent, 16);
        assert_eq!(config.poll_interval_ms, DEFAULT_POLL_INTERVAL_MS);
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_event_run_failed_carries_error() {
        let run_id = Uuid::new_v4();
        let attachment_id = Uuid::new_v4();
        let event = WorkerEvent::RunFailed {
            run_id,
            attachment_id,
            error: "test error".to_string(),
        };

        match event {
            WorkerEvent::RunFailed {
                run_id: rid,
                attachment_id: aid,
                error,
            } => {
                assert_eq!(rid, run_id);
                assert_eq!(aid, attachment_id);
                assert_eq!(error, "test error");
            }
            _ => panic!("Wrong event variant"),
        }
    }

    #[test]
    fn test_worker_event_clone() {
        let event = WorkerEvent::RunStarted {
            run_id: Uuid::new_v4(),
            attachment_id: Uuid::new_v4(),
        };
        let cloned = event.clone();
        assert!(matches!(cloned, WorkerEvent::RunStarted { .. }));
    }

    #[test]
    fn test_worker_lifecycle_events_exist() {
        assert!(matches!(WorkerEvent::WorkerStarted, WorkerEvent::WorkerStarted));
        assert!(matches!(WorkerEvent::WorkerStopped, WorkerEvent::WorkerStopped));
    }
}
