//! Core data models for cairn.
//!
//! Row types, request payloads, and status enums shared by the db, jobs,
//! and api crates. Types that appear in API responses derive
//! `utoipa::ToSchema`; internal rows do not.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// USERS & SESSIONS
// =============================================================================

/// A registered account row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    /// Stored as entered; lookups lower-case both sides.
    pub email: String,
    pub full_name: String,
    /// Salted digest in `salt$digest` form. Never exposed over the wire.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public account representation for API responses.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            full_name: user.full_name.clone(),
            created_at: user.created_at,
        }
    }
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self::from(&user)
    }
}

/// One signin's token pair, stored as digests.
///
/// Both tokens of a pair live in a single row. The opaque secrets are
/// returned to the client once at issue time and never stored; validation
/// re-hashes the presented secret and matches the digest column.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub access_token_hash: String,
    pub refresh_token_hash: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// NOTES
// =============================================================================

/// A note row. Owner is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct Note {
    pub id: Uuid,
    #[serde(skip_serializing, default)]
    pub user_id: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A note with its image attachment summary, if one exists.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct NoteWithAttachment {
    pub note: Note,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment: Option<AttachmentSummary>,
}

// =============================================================================
// IMAGE ATTACHMENTS
// =============================================================================

/// Analysis status of an image attachment.
///
/// Transitions are monotonic within one run: Pending → Processing →
/// {Completed | Failed}. Terminal states never change; a re-upload replaces
/// the record instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, utoipa::ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
}

impl AnalysisStatus {
    /// Whether this status admits no further transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for AnalysisStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid analysis status: {}", s)),
        }
    }
}

/// An image attachment row. At most one per note (unique index on note_id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageAttachment {
    pub id: Uuid,
    pub note_id: Uuid,
    pub filename: String,
    /// Backend-relative storage key for the bytes.
    pub storage_path: String,
    pub content_type: String,
    pub size_bytes: i64,
    /// Hex SHA-256 of the stored bytes. Set once after upload, then immutable.
    pub checksum: Option<String>,
    pub status: AnalysisStatus,
    /// Empty until a run completes.
    pub extracted_text: String,
    pub labels: Vec<String>,
    /// Populated only when status is Failed.
    pub error: Option<String>,
    pub uploaded_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Attachment summary for note list/detail responses.
#[derive(Debug, Clone, Serialize, Deserialize, utoipa::ToSchema)]
pub struct AttachmentSummary {
    pub id: Uuid,
    pub note_id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub size_bytes: i64,
    pub status: AnalysisStatus,
    pub uploaded_at: DateTime<Utc>,
}

// =============================================================================
// ANALYSIS RUNS
// =============================================================================

/// Status of a queued analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid run status: {}", s)),
        }
    }
}

/// One queued analysis run for an attachment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRun {
    pub id: Uuid,
    pub attachment_id: Uuid,
    pub status: RunStatus,
    pub priority: i32,
    pub retry_count: i32,
    pub max_retries: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

/// Queue depth counters for health reporting.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, utoipa::ToSchema)]
pub struct QueueStats {
    pub pending: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_analysis_status_display() {
        assert_eq!(AnalysisStatus::Pending.to_string(), "pending");
        assert_eq!(AnalysisStatus::Processing.to_string(), "processing");
        assert_eq!(AnalysisStatus::Completed.to_string(), "completed");
        assert_eq!(AnalysisStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_analysis_status_from_str() {
        assert_eq!(
            AnalysisStatus::from_str("pending").unwrap(),
            AnalysisStatus::Pending
        );
        assert_eq!(
            AnalysisStatus::from_str("PROCESSING").unwrap(),
            AnalysisStatus::Processing
        );
        assert_eq!(
            AnalysisStatus::from_str("Completed").unwrap(),
            AnalysisStatus::Completed
        );
        assert_eq!(
            AnalysisStatus::from_str("failed").unwrap(),
            AnalysisStatus::Failed
        );
        assert!(AnalysisStatus::from_str("bogus").is_err());
    }

    #[test]
    fn test_analysis_status_round_trip() {
        for status in [
            AnalysisStatus::Pending,
            AnalysisStatus::Processing,
            AnalysisStatus::Completed,
            AnalysisStatus::Failed,
        ] {
            let parsed = AnalysisStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_analysis_status_terminal() {
        assert!(!AnalysisStatus::Pending.is_terminal());
        assert!(!AnalysisStatus::Processing.is_terminal());
        assert!(AnalysisStatus::Completed.is_terminal());
        assert!(AnalysisStatus::Failed.is_terminal());
    }

    #[test]
    fn test_analysis_status_default_is_pending() {
        assert_eq!(AnalysisStatus::default(), AnalysisStatus::Pending);
    }

    #[test]
    fn test_analysis_status_serde_lowercase() {
        let json = serde_json::to_string(&AnalysisStatus::Processing).unwrap();
        assert_eq!(json, r#""processing""#);
        let back: AnalysisStatus = serde_json::from_str(r#""failed""#).unwrap();
        assert_eq!(back, AnalysisStatus::Failed);
    }

    #[test]
    fn test_run_status_round_trip() {
        for status in [
            RunStatus::Pending,
            RunStatus::Running,
            RunStatus::Completed,
            RunStatus::Failed,
        ] {
            let parsed = RunStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }
        assert!(RunStatus::from_str("paused").is_err());
    }

    #[test]
    fn test_user_profile_from_user() {
        let user = User {
            id: Uuid::nil(),
            email: "ada@example.com".to_string(),
            full_name: "Ada Lovelace".to_string(),
            password_hash: "salt$digest".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let profile = UserProfile::from(&user);
        assert_eq!(profile.id, user.id);
        assert_eq!(profile.email, "ada@example.com");
        assert_eq!(profile.full_name, "Ada Lovelace");
    }

    #[test]
    fn test_user_profile_omits_password_hash() {
        let user = User {
            id: Uuid::nil(),
            email: "ada@example.com".to_string(),
            full_name: "Ada Lovelace".to_string(),
            password_hash: "salt$digest".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&UserProfile::from(&user)).unwrap();
        assert!(!json.contains("password"));
        assert!(!json.contains("digest"));
    }

    #[test]
    fn test_note_serializes_without_owner() {
        let note = Note {
            id: Uuid::nil(),
            user_id: Uuid::new_v4(),
            title: "Groceries".to_string(),
            body: "milk".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_string(&note).unwrap();
        assert!(!json.contains("user_id"));
        assert!(json.contains("Groceries"));
    }

}
