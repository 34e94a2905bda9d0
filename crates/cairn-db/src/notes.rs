//! Note repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use cairn_core::{
    new_v7, AnalysisStatus, AttachmentSummary, CreateNoteRequest, Error, Note, NoteRepository,
    NoteWithAttachment, Result, UpdateNoteRequest,
};

/// PostgreSQL implementation of the note repository.
///
/// Every query is scoped to the owning user, so a note belonging to someone
/// else behaves exactly like a note that does not exist.
#[derive(Clone)]
pub struct PgNoteRepository {
    pool: Pool<Postgres>,
}

impl PgNoteRepository {
    /// Create a new PgNoteRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NoteRepository for PgNoteRepository {
    async fn insert(&self, user_id: Uuid, req: CreateNoteRequest) -> Result<Note> {
        let id = new_v7();

        let row = sqlx::query(
            r#"INSERT INTO note (id, user_id, title, body)
               VALUES ($1, $2, $3, $4)
               RETURNING id, user_id, title, body, created_at, updated_at"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&req.title)
        .bind(&req.body)
        .fetch_one(&self.pool)
        .await?;

        Ok(note_from_row(&row))
    }

    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Note> {
        let row = sqlx::query(
            r#"SELECT id, user_id, title, body, created_at, updated_at
               FROM note WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NoteNotFound(id))?;

        Ok(note_from_row(&row))
    }

    async fn list(&self, user_id: Uuid) -> Result<Vec<NoteWithAttachment>> {
        let rows = sqlx::query(
            r#"SELECT n.id, n.user_id, n.title, n.body, n.created_at, n.updated_at,
                      a.id AS attachment_id, a.filename, a.content_type,
                      a.size_bytes, a.status, a.uploaded_at
               FROM note n
               LEFT JOIN image_attachment a ON a.note_id = n.id
               WHERE n.user_id = $1
               ORDER BY n.updated_at DESC"#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut notes = Vec::with_capacity(rows.len());
        for row in rows {
            let note = note_from_row(&row);
            let attachment = row
                .get::<Option<Uuid>, _>("attachment_id")
                .map(|attachment_id| AttachmentSummary {
                    id: attachment_id,
                    note_id: note.id,
                    filename: row.get("filename"),
                    content_type: row.get("content_type"),
                    size_bytes: row.get("size_bytes"),
                    status: parse_analysis_status(row.get("status")),
                    uploaded_at: row.get("uploaded_at"),
                });
            notes.push(NoteWithAttachment { note, attachment });
        }

        Ok(notes)
    }

    async fn update(&self, user_id: Uuid, id: Uuid, req: UpdateNoteRequest) -> Result<Note> {
        let row = sqlx::query(
            r#"UPDATE note
               SET title = COALESCE($3, title),
                   body = COALESCE($4, body),
                   updated_at = NOW()
               WHERE id = $1 AND user_id = $2
               RETURNING id, user_id, title, body, created_at, updated_at"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&req.title)
        .bind(&req.body)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(Error::NoteNotFound(id))?;

        Ok(note_from_row(&row))
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<String>> {
        let mut tx = self.pool.begin().await?;

        // Capture the attachment's storage path before the cascade removes
        // the row, so the caller can clean up the bytes.
        let storage_path: Option<String> = sqlx::query_scalar(
            r#"SELECT a.storage_path
               FROM image_attachment a
               JOIN note n ON a.note_id = n.id
               WHERE n.id = $1 AND n.user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let result = sqlx::query("DELETE FROM note WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(Error::NoteNotFound(id));
        }

        tx.commit().await?;
        Ok(storage_path)
    }

    async fn exists(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM note WHERE id = $1 AND user_id = $2)")
                .bind(id)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }
}

/// Convert a database row to a Note.
fn note_from_row(row: &sqlx::postgres::PgRow) -> Note {
    Note {
        id: row.get("id"),
        user_id: row.get("user_id"),
        title: row.get("title"),
        body: row.get("body"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Parse an analysis status from its database string, falling back to the
/// default for anything unrecognized.
fn parse_analysis_status(s: &str) -> AnalysisStatus {
    s.parse().unwrap_or_default()
}
