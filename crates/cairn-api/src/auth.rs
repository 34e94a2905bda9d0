//! Bearer-token authentication extractor.

use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use uuid::Uuid;

use cairn_core::SessionRepository;

use crate::{ApiError, AppState};

/// Extractor for endpoints that require a signed-in user.
///
/// Validates the `Authorization: Bearer <access token>` header against the
/// session store and resolves it to the owning account. Missing, malformed,
/// expired, and revoked tokens all reject with 401.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok());

        let token = match auth_header {
            Some(header) if header.starts_with("Bearer ") => {
                header.trim_start_matches("Bearer ").trim()
            }
            _ => {
                return Err(ApiError::Unauthorized(
                    "Authentication required".to_string(),
                ))
            }
        };

        match state.db.sessions.validate_access_token(token).await {
            Ok(Some(session)) => Ok(CurrentUser {
                user_id: session.user_id,
            }),
            Ok(None) => Err(ApiError::Unauthorized(
                "Token is invalid or expired".to_string(),
            )),
            Err(e) => Err(e.into()),
        }
    }
}
