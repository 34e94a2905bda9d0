//! Core traits for cairn abstractions.
//!
//! These traits define the interfaces that concrete implementations
//! must satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// USER & SESSION REPOSITORY TRAITS
// =============================================================================

/// Request for creating a new account.
#[derive(Debug, Clone)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    /// Plaintext; hashed by the repository before storage.
    pub password: String,
}

/// A freshly issued token pair.
///
/// Carries the opaque secrets, which exist only in this value. The stored
/// session row keeps digests.
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

/// Repository for account records.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new account. Fails with `InvalidInput` if the email is taken.
    async fn create(&self, req: CreateUserRequest) -> Result<User>;

    /// Look up an account by email (case-insensitive).
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Look up an account by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>>;

    /// Verify email + password, returning the account on match.
    async fn verify_credentials(&self, email: &str, password: &str) -> Result<Option<User>>;
}

/// Repository for auth sessions (token pairs).
#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Issue a new session for the user, returning the opaque secrets.
    async fn create_session(&self, user_id: Uuid) -> Result<IssuedTokens>;

    /// Resolve a presented access token to its live session.
    ///
    /// Returns `None` for unknown, expired, or revoked tokens.
    async fn validate_access_token(&self, token: &str) -> Result<Option<AuthSession>>;

    /// Rotate a session: validate the refresh token, revoke its session,
    /// and issue a fresh pair. Returns `None` if the token is not live.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Option<IssuedTokens>>;

    /// Revoke the session holding this refresh token.
    ///
    /// Returns true if a live session was revoked.
    async fn revoke_by_refresh_token(&self, refresh_token: &str, reason: &str) -> Result<bool>;

    /// Delete sessions whose refresh tokens expired. Returns rows removed.
    async fn cleanup_expired(&self) -> Result<u64>;
}

// =============================================================================
// NOTE REPOSITORY TRAITS
// =============================================================================

/// Request for creating a new note.
#[derive(Debug, Clone)]
pub struct CreateNoteRequest {
    pub title: String,
    pub body: String,
}

/// Request for updating a note. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateNoteRequest {
    pub title: Option<String>,
    pub body: Option<String>,
}

/// Repository for owner-scoped note CRUD.
///
/// Every operation takes the owner's id; a note owned by someone else is
/// indistinguishable from a missing note (`NoteNotFound`).
#[async_trait]
pub trait NoteRepository: Send + Sync {
    /// Insert a new note for the owner.
    async fn insert(&self, user_id: Uuid, req: CreateNoteRequest) -> Result<Note>;

    /// Fetch one of the owner's notes.
    async fn fetch(&self, user_id: Uuid, id: Uuid) -> Result<Note>;

    /// List the owner's notes, most recently updated first, each with its
    /// attachment summary if present.
    async fn list(&self, user_id: Uuid) -> Result<Vec<NoteWithAttachment>>;

    /// Update title and/or body. Bumps `updated_at`.
    async fn update(&self, user_id: Uuid, id: Uuid, req: UpdateNoteRequest) -> Result<Note>;

    /// Delete one of the owner's notes. The attachment row cascades;
    /// returns the attachment's storage path, if any, for byte cleanup.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<Option<String>>;

    /// Check whether the owner has a note with this id.
    async fn exists(&self, user_id: Uuid, id: Uuid) -> Result<bool>;
}

// =============================================================================
// ATTACHMENT REPOSITORY TRAITS
// =============================================================================

/// Repository for image attachments and their stored bytes.
#[async_trait]
pub trait AttachmentRepository: Send + Sync {
    /// Replace the note's attachment: write the new bytes, then in one
    /// transaction delete any prior record and insert a fresh `Pending` one.
    /// The replaced attachment's bytes are removed after commit.
    async fn replace_for_note(
        &self,
        note_id: Uuid,
        filename: &str,
        content_type: &str,
        data: &[u8],
    ) -> Result<ImageAttachment>;

    /// Get an attachment by id.
    async fn get(&self, id: Uuid) -> Result<ImageAttachment>;

    /// Get the attachment for a note, if one exists.
    async fn get_by_note(&self, note_id: Uuid) -> Result<Option<ImageAttachment>>;

    /// Download the stored bytes. Returns (data, content_type, filename).
    async fn download(&self, id: Uuid) -> Result<(Vec<u8>, String, String)>;

    /// Record the checksum. Pins `checksum IS NULL`; a second write is
    /// rejected as `AttachmentNotFound` (the row it targeted is gone).
    async fn set_checksum(&self, id: Uuid, checksum: &str) -> Result<()>;

    /// Pending → Processing. Status-only update, pinned on `pending`.
    async fn mark_processing(&self, id: Uuid) -> Result<()>;

    /// Processing → Completed. Persists text + labels, clears error.
    async fn complete(&self, id: Uuid, extracted_text: &str, labels: &[String]) -> Result<()>;

    /// Processing → Failed. Persists error detail only.
    async fn fail(&self, id: Uuid, error: &str) -> Result<()>;

    /// Delete the attachment record and its stored bytes.
    async fn delete(&self, id: Uuid) -> Result<()>;
}

// =============================================================================
// ANALYSIS QUEUE TRAITS
// =============================================================================

/// Repository for the analysis run queue.
#[async_trait]
pub trait AnalysisQueue: Send + Sync {
    /// Queue an analysis run for an attachment. Returns the run id.
    async fn enqueue(&self, attachment_id: Uuid, priority: i32) -> Result<Uuid>;

    /// Claim the next pending run for processing.
    async fn claim_next(&self) -> Result<Option<AnalysisRun>>;

    /// Get a run by id.
    async fn get_run(&self, run_id: Uuid) -> Result<Option<AnalysisRun>>;

    /// Mark a run as completed.
    async fn complete(&self, run_id: Uuid) -> Result<()>;

    /// Mark a run as failed, or re-queue it if retries remain.
    async fn fail(&self, run_id: Uuid, error: &str) -> Result<()>;

    /// Get pending runs count.
    async fn pending_count(&self) -> Result<i64>;

    /// Get queue statistics.
    async fn queue_stats(&self) -> Result<QueueStats>;

    /// Clean up old completed/failed runs, keeping the most recent
    /// `keep_count`. Returns rows removed.
    async fn cleanup(&self, keep_count: i64) -> Result<i64>;
}
