//! Image attachment handlers: upload, metadata, raw bytes, delete.
//!
//! Uploads carry base64 bytes in a JSON body. A successful upload replaces
//! any prior attachment on the note and queues an analysis run; the response
//! reports `pending` until a worker picks it up.

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use cairn_core::{
    checksum_bytes, defaults, detect_content_type, sanitize_filename, validate_image,
    AnalysisQueue, AnalysisStatus, AttachmentRepository, ImageAttachment, NoteRepository,
};

use crate::auth::CurrentUser;
use crate::{ApiError, AppState};

/// Request body for uploading a note's image.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct UploadImageRequest {
    pub filename: String,
    pub content_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

/// Attachment metadata, including analysis state.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct AttachmentResponse {
    pub id: Uuid,
    pub note_id: Uuid,
    pub filename: String,
    /// Path for downloading the stored bytes.
    pub url: String,
    pub content_type: String,
    pub size_bytes: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    pub status: AnalysisStatus,
    pub extracted_text: String,
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl From<ImageAttachment> for AttachmentResponse {
    fn from(attachment: ImageAttachment) -> Self {
        Self {
            url: format!("/api/v1/notes/{}/image/data", attachment.note_id),
            id: attachment.id,
            note_id: attachment.note_id,
            filename: attachment.filename,
            content_type: attachment.content_type,
            size_bytes: attachment.size_bytes,
            checksum: attachment.checksum,
            status: attachment.status,
            extracted_text: attachment.extracted_text,
            labels: attachment.labels,
            error: attachment.error,
            uploaded_at: attachment.uploaded_at,
        }
    }
}

/// Upload or replace the note's image and queue it for analysis.
#[utoipa::path(post, path = "/api/v1/notes/{note_id}/image", tag = "Attachments",
    params(("note_id" = Uuid, Path, description = "Note id")),
    request_body = UploadImageRequest,
    responses(
        (status = 201, description = "Image stored, analysis pending", body = AttachmentResponse),
        (status = 400, description = "Bad base64, oversized, or disallowed type"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such note for this account"),
    ))]
pub async fn upload_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(note_id): Path<Uuid>,
    Json(req): Json<UploadImageRequest>,
) -> Result<(StatusCode, Json<AttachmentResponse>), ApiError> {
    let note = state.db.notes.fetch(user.user_id, note_id).await?;

    let data = base64::engine::general_purpose::STANDARD
        .decode(req.data.as_bytes())
        .map_err(|e| ApiError::BadRequest(format!("Invalid base64 image data: {}", e)))?;
    if data.is_empty() {
        return Err(ApiError::BadRequest("Image data is empty.".to_string()));
    }

    let verdict = validate_image(&req.content_type, data.len(), defaults::MAX_IMAGE_SIZE_BYTES);
    if let Some(reason) = verdict.block_reason {
        return Err(ApiError::BadRequest(reason));
    }

    let filename = sanitize_filename(&req.filename);
    let attachment = state
        .db
        .attachments
        .replace_for_note(note.id, &filename, &req.content_type, &data)
        .await?;

    let checksum = checksum_bytes(&data);
    state
        .db
        .attachments
        .set_checksum(attachment.id, &checksum)
        .await?;

    let run_id = state
        .db
        .queue
        .enqueue(attachment.id, defaults::RUN_PRIORITY)
        .await?;

    info!(
        subsystem = "api",
        note_id = %note.id,
        attachment_id = %attachment.id,
        run_id = %run_id,
        size_bytes = attachment.size_bytes,
        "Image uploaded and queued for analysis"
    );

    let mut response = AttachmentResponse::from(attachment);
    response.checksum = Some(checksum);

    Ok((StatusCode::CREATED, Json(response)))
}

/// Attachment metadata for a note.
#[utoipa::path(get, path = "/api/v1/notes/{note_id}/image", tag = "Attachments",
    params(("note_id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 200, description = "Attachment metadata", body = AttachmentResponse),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such note, or note has no attachment"),
    ))]
pub async fn get_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(note_id): Path<Uuid>,
) -> Result<Json<AttachmentResponse>, ApiError> {
    let note = state.db.notes.fetch(user.user_id, note_id).await?;
    let attachment = state
        .db
        .attachments
        .get_by_note(note.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note has no attachment.".to_string()))?;

    Ok(Json(AttachmentResponse::from(attachment)))
}

/// Stored image bytes, served with the uploaded content type.
#[utoipa::path(get, path = "/api/v1/notes/{note_id}/image/data", tag = "Attachments",
    params(("note_id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 200, description = "Raw image bytes", content_type = "application/octet-stream"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such note, or note has no attachment"),
    ))]
pub async fn download_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(note_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.db.notes.fetch(user.user_id, note_id).await?;
    let attachment = state
        .db
        .attachments
        .get_by_note(note.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note has no attachment.".to_string()))?;

    let (data, content_type, filename) = state.db.attachments.download(attachment.id).await?;

    // Serve the sniffed type, not the stored claim.
    let content_type = detect_content_type(&data, &content_type);

    let headers = [
        (header::CONTENT_TYPE, content_type),
        (
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", filename),
        ),
    ];

    Ok((headers, data))
}

/// Delete the note's attachment record and stored bytes.
#[utoipa::path(delete, path = "/api/v1/notes/{note_id}/image", tag = "Attachments",
    params(("note_id" = Uuid, Path, description = "Note id")),
    responses(
        (status = 204, description = "Attachment deleted"),
        (status = 401, description = "Not signed in"),
        (status = 404, description = "No such note, or note has no attachment"),
    ))]
pub async fn delete_image(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(note_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let note = state.db.notes.fetch(user.user_id, note_id).await?;
    let attachment = state
        .db
        .attachments
        .get_by_note(note.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Note has no attachment.".to_string()))?;

    state.db.attachments.delete(attachment.id).await?;

    info!(
        subsystem = "api",
        note_id = %note.id,
        attachment_id = %attachment.id,
        "Attachment deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn sample_attachment() -> ImageAttachment {
        ImageAttachment {
            id: Uuid::now_v7(),
            note_id: Uuid::now_v7(),
            filename: "receipt.png".to_string(),
            storage_path: "ab/cd/abcd.png".to_string(),
            content_type: "image/png".to_string(),
            size_bytes: 2048,
            checksum: Some("deadbeef".to_string()),
            status: AnalysisStatus::Pending,
            extracted_text: String::new(),
            labels: Vec::new(),
            error: None,
            uploaded_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_response_url_points_at_download_route() {
        let attachment = sample_attachment();
        let note_id = attachment.note_id;
        let response = AttachmentResponse::from(attachment);
        assert_eq!(response.url, format!("/api/v1/notes/{}/image/data", note_id));
    }

    #[test]
    fn test_response_omits_error_until_failure() {
        let response = AttachmentResponse::from(sample_attachment());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["status"], "pending");

        let mut failed = sample_attachment();
        failed.status = AnalysisStatus::Failed;
        failed.error = Some("provider unreachable".to_string());
        let json = serde_json::to_value(&AttachmentResponse::from(failed)).unwrap();
        assert_eq!(json["error"], "provider unreachable");
        assert_eq!(json["status"], "failed");
    }

    #[test]
    fn test_response_does_not_expose_storage_path() {
        let response = AttachmentResponse::from(sample_attachment());
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("storage_path").is_none());
    }
}
