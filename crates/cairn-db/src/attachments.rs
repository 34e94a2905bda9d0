//! Image attachment repository implementation.
//!
//! A note has at most one image. Uploading to a note that already has one
//! replaces it: the old record and bytes go away, and analysis starts over
//! from `pending`. Bytes are written to the storage backend before the
//! record exists and removed after it is gone, so the database never points
//! at bytes that were not written.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tracing::warn;
use uuid::Uuid;

use cairn_core::{
    new_v7, AnalysisStatus, AttachmentRepository, Error, ImageAttachment, Result,
};

use crate::file_storage::{generate_storage_path, StorageBackend};

/// PostgreSQL implementation of the attachment repository.
pub struct PgAttachmentRepository {
    pool: Pool<Postgres>,
    backend: Box<dyn StorageBackend>,
}

impl PgAttachmentRepository {
    /// Create a new PgAttachmentRepository with the given pool and backend.
    pub fn new(pool: Pool<Postgres>, backend: impl StorageBackend + 'static) -> Self {
        Self {
            pool,
            backend: Box::new(backend),
        }
    }
}

#[async_trait]
impl AttachmentRepository for PgAttachmentRepository {
    async fn replace_for_note(
        &self,
        note_id: Uuid,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<ImageAttachment> {
        let id = new_v7();
        let path = generate_storage_path(&id);

        // Bytes first. If the row insert below fails we leak an orphan blob,
        // never a record pointing at missing bytes.
        self.backend.write(&path, data).await?;

        let mut tx = self.pool.begin().await?;

        let old_path: Option<String> =
            sqlx::query_scalar("SELECT storage_path FROM image_attachment WHERE note_id = $1")
                .bind(note_id)
                .fetch_optional(&mut *tx)
                .await?;

        sqlx::query("DELETE FROM image_attachment WHERE note_id = $1")
            .bind(note_id)
            .execute(&mut *tx)
            .await?;

        let row = sqlx::query(
            r#"INSERT INTO image_attachment
               (id, note_id, filename, storage_path, content_type, size_bytes)
               VALUES ($1, $2, $3, $4, $5, $6)
               RETURNING id, note_id, filename, storage_path, content_type, size_bytes,
                         checksum, status, extracted_text, labels, error,
                         uploaded_at, updated_at"#,
        )
        .bind(id)
        .bind(note_id)
        .bind(filename)
        .bind(&path)
        .bind(content_type)
        .bind(data.len() as i64)
        .fetch_one(&mut *tx)
        .await?;

        let attachment = attachment_from_row(&row)?;
        tx.commit().await?;

        if let Some(old_path) = old_path {
            if let Err(e) = self.backend.delete(&old_path).await {
                warn!(
                    subsystem = "storage",
                    storage_path = %old_path,
                    error = %e,
                    "Failed to remove replaced attachment bytes"
                );
            }
        }

        Ok(attachment)
    }

    async fn get(&self, id: Uuid) -> Result<ImageAttachment> {
        let row = sqlx::query(
            r#"SELECT id, note_id, filename, storage_path, content_type, size_bytes,
                      checksum, status, extracted_text, labels, error,
                      uploaded_at, updated_at
               FROM image_attachment WHERE id = $1"#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::AttachmentNotFound(id))?;

        attachment_from_row(&row)
    }

    async fn get_by_note(&self, note_id: Uuid) -> Result<Option<ImageAttachment>> {
        let row = sqlx::query(
            r#"SELECT id, note_id, filename, storage_path, content_type, size_bytes,
                      checksum, status, extracted_text, labels, error,
                      uploaded_at, updated_at
               FROM image_attachment WHERE note_id = $1"#,
        )
        .bind(note_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| attachment_from_row(&r)).transpose()
    }

    async fn download(&self, id: Uuid) -> Result<(Vec<u8>, String, String)> {
        let row = sqlx::query(
            "SELECT storage_path, content_type, filename FROM image_attachment WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::AttachmentNotFound(id))?;

        let path: String = row.get("storage_path");
        let content_type: String = row.get("content_type");
        let filename: String = row.get("filename");

        let data = self.backend.read(&path).await?;
        Ok((data, content_type, filename))
    }

    async fn set_checksum(&self, id: Uuid, checksum: &str) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE image_attachment
               SET checksum = $2, updated_at = NOW()
               WHERE id = $1 AND checksum IS NULL"#,
        )
        .bind(id)
        .bind(checksum)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AttachmentNotFound(id));
        }
        Ok(())
    }

    async fn mark_processing(&self, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE image_attachment
               SET status = 'processing', updated_at = NOW()
               WHERE id = $1 AND status = 'pending'"#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AttachmentNotFound(id));
        }
        Ok(())
    }

    async fn complete(&self, id: Uuid, extracted_text: &str, labels: &[String]) -> Result<()> {
        let labels_json = serde_json::to_value(labels)?;

        let result = sqlx::query(
            r#"UPDATE image_attachment
               SET status = 'completed', extracted_text = $2, labels = $3,
                   error = NULL, updated_at = NOW()
               WHERE id = $1 AND status = 'processing'"#,
        )
        .bind(id)
        .bind(extracted_text)
        .bind(labels_json)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AttachmentNotFound(id));
        }
        Ok(())
    }

    async fn fail(&self, id: Uuid, error: &str) -> Result<()> {
        let result = sqlx::query(
            r#"UPDATE image_attachment
               SET status = 'failed', error = $2, updated_at = NOW()
               WHERE id = $1 AND status = 'processing'"#,
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(Error::AttachmentNotFound(id));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let storage_path: Option<String> =
            sqlx::query_scalar("SELECT storage_path FROM image_attachment WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(storage_path) = storage_path else {
            return Err(Error::AttachmentNotFound(id));
        };

        sqlx::query("DELETE FROM image_attachment WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        // Record first, bytes second. A failed byte delete leaves an orphan
        // blob, which is harmless.
        if let Err(e) = self.backend.delete(&storage_path).await {
            warn!(
                subsystem = "storage",
                storage_path = %storage_path,
                error = %e,
                "Failed to remove deleted attachment bytes"
            );
        }

        Ok(())
    }
}

/// Convert a database row to an ImageAttachment.
fn attachment_from_row(row: &sqlx::postgres::PgRow) -> Result<ImageAttachment> {
    let status: String = row.get("status");
    let labels: serde_json::Value = row.get("labels");

    Ok(ImageAttachment {
        id: row.get("id"),
        note_id: row.get("note_id"),
        filename: row.get("filename"),
        storage_path: row.get("storage_path"),
        content_type: row.get("content_type"),
        size_bytes: row.get("size_bytes"),
        checksum: row.get("checksum"),
        status: status.parse().unwrap_or(AnalysisStatus::Pending),
        extracted_text: row.get("extracted_text"),
        labels: serde_json::from_value(labels).unwrap_or_default(),
        error: row.get("error"),
        uploaded_at: row.get("uploaded_at"),
        updated_at: row.get("updated_at"),
    })
}
