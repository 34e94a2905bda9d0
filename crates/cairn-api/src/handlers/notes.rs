//! Note CRUD handlers.
//!
//! Every route is owner-scoped through [`CurrentUser`]: a note belonging to
//! another account is indistinguishable from one that does not exist.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use cairn_core::{
    defaults, CreateNoteRequest, Note, NoteRepository, NoteWithAttachment, UpdateNoteRequest,
};
use cairn_db::{FilesystemBackend, StorageBackend};

use crate::auth::CurrentUser;
use crate::{ApiError, AppState};

/// Request body for creating a note.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct CreateNotePayload {
    pub title: String,
    /// Defaults to empty when omitted.
    #[serde(default)]
    pub body: Option<String>,
}

/// Request body for a partial note update. Omitted fields are left unchanged.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UpdateNotePayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
}

/// Validate and normalize a note title.
fn validate_title(title: &str) -> Result<String, ApiError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("Title is required.".to_string()));
    }
    if trimmed.chars().count() > defaults::NOTE_TITLE_MAX_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Title must be at most {} characters.",
            defaults::NOTE_TITLE_MAX_LENGTH
        )));
    }
    Ok(trimmed.to_string())
}

/// List the caller's notes, most recently updated first.
#[utoipa::path(get, path = "/api/v1/notes", tag = "Notes",
    responses(
        (status = 200, description = "Notes with attachment summaries", body = Vec<NoteWithAttachment>),
        (status = 401, description = "Not signed in"),
    ))]
pub async fn list_notes(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Vec<NoteWithAttachment>>, ApiError> {
    let notes = state.db.notes.list(user.user_id).await?;
    Ok(Json(notes))
}

/// Create a note.
#[utoipa::path(post, path = "/api/v1/notes", tag = "Notes",
    request_body = CreateNotePayload,
    responses(
        (status = 201, description = "Note created", body = Note),
        (status = 400, description = "Missing or oversized title"),
        (status = 401, description = "Not signed in"),
    ))]
pub async fn create_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(payload): Json<CreateNotePayload>,
) -> Result<(StatusCode, Json<Note>), ApiError> {
    let title = validate_title(&payload.title)?;
    let note = state
        .db
        .notes
        .insert(
            user.user_id,
            CreateNoteRequest {
                title,
                body: payload.body.unwrap_or_default(),
            },
        )
        .await?;

    info!(subsystem = "api", note_id = %note.id, "Note created");

    Ok((StatusCode::CREATED, Json(note)))
}

/// Fetch one note.
#[utoipa::path(get, path = "/api/v1/notes/{note_id}", tag = "Notes",
    params(("note_id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 200, description = "The note", body = Note),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such note for this account"),
    ))]
pub async fn get_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(note_id): Path<Uuid>,
) -> Result<Json<Note>, ApiError> {
    let note = state.db.notes.fetch(user.user_id, note_id).await?;
    Ok(Json(note))
}

/// Partially update a note.
#[utoipa::path(patch, path = "/api/v1/notes/{note_id}", tag = "Notes",
    params(("note_id" = Uuid, Path, description = "Note id")),
    request_body = UpdateNotePayload,
    responses(
        (status = 200, description = "Updated note", body = Note),
        (status = 400, description = "Invalid title"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such note for this account"),
    ))]
pub async fn update_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(note_id): Path<Uuid>,
    Json(payload): Json<UpdateNotePayload>,
) -> Result<Json<Note>, ApiError> {
    let title = match payload.title.as_deref() {
        Some(t) => Some(validate_title(t)?),
        None => None,
    };

    let note = state
        .db
        .notes
        .update(
            user.user_id,
            note_id,
            UpdateNoteRequest {
                title,
                body: payload.body,
            },
        )
        .await?;

    Ok(Json(note))
}

/// Delete a note and its attachment, if any.
#[utoipa::path(delete, path = "/api/v1/notes/{note_id}", tag = "Notes",
    params(("note_id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 204, description = "Note deleted"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such note for this account"),
    ))]
pub async fn delete_note(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(note_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let orphaned_path = state.db.notes.delete(user.user_id, note_id).await?;

    // The record is gone either way; leaked bytes are only worth a warning.
    if let Some(path) = orphaned_path {
        let storage = FilesystemBackend::new(state.db.storage_path());
        if let Err(e) = storage.delete(&path).await {
            warn!(
                subsystem = "api",
                note_id = %note_id,
                path = %path,
                error = %e,
                "Failed to remove attachment bytes for deleted note"
            );
        }
    }

    info!(subsystem = "api", note_id = %note_id, "Note deleted");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_trimmed_and_accepted() {
        assert_eq!(validate_title("  Groceries  ").unwrap(), "Groceries");
    }

    #[test]
    fn test_title_required() {
        for title in ["", "   ", "\t\n"] {
            let err = validate_title(title).unwrap_err();
            match err {
                ApiError::BadRequest(msg) => assert_eq!(msg, "Title is required."),
                other => panic!("expected BadRequest, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_title_length_limit_counts_characters() {
        let max = defaults::NOTE_TITLE_MAX_LENGTH;
        assert!(validate_title(&"x".repeat(max)).is_ok());
        // Multibyte characters count once each.
        assert!(validate_title(&"ü".repeat(max)).is_ok());

        let err = validate_title(&"x".repeat(max + 1)).unwrap_err();
        match err {
            ApiError::BadRequest(msg) => {
                assert_eq!(msg, format!("Title must be at most {} characters.", max));
            }
            other => panic!("expected BadRequest, got {:?}", other),
        }
    }
}
