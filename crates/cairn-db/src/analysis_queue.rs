//! Analysis run queue implementation.
//!
//! Runs are claimed with `FOR UPDATE SKIP LOCKED`, so any number of workers
//! can poll the same table without double-claiming. Enqueueing notifies
//! waiting workers through a shared [`Notify`] handle.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::Notify;
use uuid::Uuid;

use cairn_core::{
    new_v7, AnalysisQueue, AnalysisRun, Error, QueueStats, Result, RunStatus,
};

/// PostgreSQL implementation of the analysis queue.
pub struct PgAnalysisQueue {
    pool: Pool<Postgres>,
    /// Notify handle for event-driven worker wake.
    notify: Arc<Notify>,
}

impl PgAnalysisQueue {
    /// Create a new PgAnalysisQueue with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            pool,
            notify: Arc::new(Notify::new()),
        }
    }

    /// Create a new PgAnalysisQueue sharing an existing notify handle.
    pub fn with_notify(pool: Pool<Postgres>, notify: Arc<Notify>) -> Self {
        Self { pool, notify }
    }

    /// Get the run notification handle for event-driven waking.
    pub fn run_notify(&self) -> Arc<Notify> {
        self.notify.clone()
    }

    /// Convert RunStatus to string for database.
    #[allow(dead_code)]
    fn run_status_to_str(status: RunStatus) -> &'static str {
        match status {
            RunStatus::Pending => "pending",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    /// Convert string from database to RunStatus.
    fn str_to_run_status(s: &str) -> RunStatus {
        match s {
            "pending" => RunStatus::Pending,
            "running" => RunStatus::Running,
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed,
            _ => RunStatus::Pending, // fallback
        }
    }

    /// Parse a run row into an AnalysisRun struct.
    fn parse_run_row(row: sqlx::postgres::PgRow) -> AnalysisRun {
        AnalysisRun {
            id: row.get("id"),
            attachment_id: row.get("attachment_id"),
            status: Self::str_to_run_status(row.get("status")),
            priority: row.get("priority"),
            retry_count: row.get("retry_count"),
            max_retries: row.get("max_retries"),
            error: row.get("error"),
            created_at: row.get("created_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
            duration_ms: row.get("duration_ms"),
        }
    }
}

#[async_trait]
impl AnalysisQueue for PgAnalysisQueue {
    async fn enqueue(&self, attachment_id: Uuid, priority: i32) -> Result<Uuid> {
        let run_id = new_v7();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO analysis_run (id, attachment_id, status, priority, created_at)
             VALUES ($1, $2, 'pending', $3, $4)",
        )
        .bind(run_id)
        .bind(attachment_id)
        .bind(priority)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        self.notify.notify_waiters();
        Ok(run_id)
    }

    async fn claim_next(&self) -> Result<Option<AnalysisRun>> {
        let now = Utc::now();

        // FOR UPDATE SKIP LOCKED lets concurrent workers claim without
        // blocking each other.
        let row = sqlx::query(
            "UPDATE analysis_run
             SET status = 'running', started_at = $1
             WHERE id = (
                 SELECT id FROM analysis_run
                 WHERE status = 'pending'
                 ORDER BY priority DESC, created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, attachment_id, status, priority, retry_count, max_retries,
                       error, created_at, started_at, completed_at, duration_ms",
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_run_row))
    }

    async fn get_run(&self, run_id: Uuid) -> Result<Option<AnalysisRun>> {
        let row = sqlx::query(
            "SELECT id, attachment_id, status, priority, retry_count, max_retries,
                    error, created_at, started_at, completed_at, duration_ms
             FROM analysis_run
             WHERE id = $1",
        )
        .bind(run_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_run_row))
    }

    async fn complete(&self, run_id: Uuid) -> Result<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let started_at: Option<chrono::DateTime<Utc>> =
            sqlx::query_scalar("SELECT started_at FROM analysis_run WHERE id = $1")
                .bind(run_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

        let duration_ms = started_at.map(|s| (now - s).num_milliseconds());

        sqlx::query(
            "UPDATE analysis_run
             SET status = 'completed', completed_at = $1, duration_ms = $2
             WHERE id = $3",
        )
        .bind(now)
        .bind(duration_ms)
        .bind(run_id)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        tx.commit().await.map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, run_id: Uuid, error: &str) -> Result<()> {
        let now = Utc::now();

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let (retry_count, max_retries): (i32, i32) =
            sqlx::query_as("SELECT retry_count, max_retries FROM analysis_run WHERE id = $1")
                .bind(run_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(Error::Database)?;

        if retry_count < max_retries {
            // Retry: reset to pending with incremented retry count
            sqlx::query(
                "UPDATE analysis_run
                 SET status = 'pending', retry_count = $1, error = $2, started_at = NULL
                 WHERE id = $3",
            )
            .bind(retry_count + 1)
            .bind(error)
            .bind(run_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        } else {
            // Max retries exceeded: mark as failed
            sqlx::query(
                "UPDATE analysis_run
                 SET status = 'failed', completed_at = $1, error = $2
                 WHERE id = $3",
            )
            .bind(now)
            .bind(error)
            .bind(run_id)
            .execute(&mut *tx)
            .await
            .map_err(Error::Database)?;
        }

        tx.commit().await.map_err(Error::Database)?;

        // A retried run is pending again; wake a worker for it.
        if retry_count < max_retries {
            self.notify.notify_waiters();
        }
        Ok(())
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM analysis_run WHERE status = 'pending'")
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(count)
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        let row = sqlx::query(
            "SELECT
                COUNT(*) FILTER (WHERE status = 'pending') as pending,
                COUNT(*) FILTER (WHERE status = 'running') as running,
                COUNT(*) FILTER (WHERE status = 'completed') as completed,
                COUNT(*) FILTER (WHERE status = 'failed') as failed
             FROM analysis_run",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(QueueStats {
            pending: row.get::<i64, _>("pending"),
            running: row.get::<i64, _>("running"),
            completed: row.get::<i64, _>("completed"),
            failed: row.get::<i64, _>("failed"),
        })
    }

    async fn cleanup(&self, keep_count: i64) -> Result<i64> {
        let result = sqlx::query(
            "DELETE FROM analysis_run
             WHERE id NOT IN (
                 SELECT id FROM analysis_run
                 ORDER BY
                     CASE WHEN status IN ('pending', 'running') THEN 0 ELSE 1 END,
                     completed_at DESC NULLS LAST
                 LIMIT $1
             )",
        )
        .bind(keep_count)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(result.rows_affected() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_status_to_str_all_variants() {
        assert_eq!(PgAnalysisQueue::run_status_to_str(RunStatus::Pending), "pending");
        assert_eq!(PgAnalysisQueue::run_status_to_str(RunStatus::Running), "running");
        assert_eq!(
            PgAnalysisQueue::run_status_to_str(RunStatus::Completed),
            "completed"
        );
        assert_eq!(PgAnalysisQueue::run_status_to_str(RunStatus::Failed), "failed");
    }

    #[test]
    fn test_str_to_run_status_all_variants() {
        assert_eq!(PgAnalysisQueue::str_to_run_status("pending"), RunStatus::Pending);
        assert_eq!(PgAnalysisQueue::str_to_run_status("running"), RunStatus::Running);
        assert_eq!(
            PgAnalysisQueue::str_to_run_status("completed"),
            RunStatus::Completed
        );
        assert_eq!(PgAnalysisQueue::str_to_run_status("failed"), RunStatus::Failed);
    }

    #[test]
    fn test_str_to_run_status_fallback() {
        assert_eq!(PgAnalysisQueue::str_to_run_status("bogus"), RunStatus::Pending);
        assert_eq!(PgAnalysisQueue::str_to_run_status(""), RunStatus::Pending);
    }

    #[test]
    fn test_round_trip_all_statuses() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
        ] {
            let s = PgAnalysisQueue::run_status_to_str(status);
            assert_eq!(PgAnalysisQueue::str_to_run_status(s), status);
        }
    }
}
