//! Auth HTTP handlers: signup, signin, refresh, signout, and current user.
//!
//! Token pairs are opaque secrets returned once at issue time; the server
//! stores only digests. Refresh rotates the pair and revokes the old
//! session, signout revokes without replacement.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use cairn_core::{defaults, CreateUserRequest, SessionRepository, UserProfile, UserRepository};

use crate::auth::CurrentUser;
use crate::{ApiError, AppState};

/// Request body for creating an account.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignUpRequest {
    pub email: String,
    pub full_name: String,
    pub password: String,
}

/// Request body for signing in.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Request body carrying a refresh token.
#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh: Option<String>,
}

/// A fresh token pair with the account it belongs to.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct SessionResponse {
    pub refresh: String,
    pub access: String,
    pub user: UserProfile,
}

/// A rotated token pair.
#[derive(Debug, Serialize, utoipa::ToSchema)]
pub struct RefreshResponse {
    pub access: String,
    pub refresh: String,
}

/// Minimal email shape check: one `@` with non-empty sides, no whitespace.
fn email_is_valid(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
}

/// Create an account and issue its first token pair.
#[utoipa::path(post, path = "/api/v1/auth/signup", tag = "Auth",
    request_body = SignUpRequest,
    responses(
        (status = 201, description = "Account created", body = SessionResponse),
        (status = 400, description = "Invalid email, name, or password"),
        (status = 409, description = "Email already registered"),
    ))]
pub async fn signup(
    State(state): State<AppState>,
    Json(req): Json<SignUpRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let email = req.email.trim();
    if !email_is_valid(email) {
        return Err(ApiError::BadRequest(
            "Enter a valid email address.".to_string(),
        ));
    }

    let full_name = req.full_name.trim();
    if full_name.is_empty() {
        return Err(ApiError::BadRequest("Full name is required.".to_string()));
    }

    if req.password.chars().count() < defaults::PASSWORD_MIN_LENGTH {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {} characters.",
            defaults::PASSWORD_MIN_LENGTH
        )));
    }

    let user = state
        .db
        .users
        .create(CreateUserRequest {
            email: email.to_string(),
            full_name: full_name.to_string(),
            password: req.password,
        })
        .await?;

    let tokens = state.db.sessions.create_session(user.id).await?;

    info!(subsystem = "api", user_id = %user.id, "Account created");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            refresh: tokens.refresh_token,
            access: tokens.access_token,
            user: UserProfile::from(&user),
        }),
    ))
}

/// Verify credentials and issue a token pair.
#[utoipa::path(post, path = "/api/v1/auth/signin", tag = "Auth",
    request_body = SignInRequest,
    responses(
        (status = 200, description = "Signed in", body = SessionResponse),
        (status = 401, description = "Invalid credentials"),
    ))]
pub async fn signin(
    State(state): State<AppState>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = state
        .db
        .users
        .verify_credentials(req.email.trim(), &req.password)
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "No active account found with the given credentials".to_string(),
            )
        })?;

    let tokens = state.db.sessions.create_session(user.id).await?;

    info!(subsystem = "api", user_id = %user.id, "Signed in");

    Ok(Json(SessionResponse {
        refresh: tokens.refresh_token,
        access: tokens.access_token,
        user: UserProfile::from(&user),
    }))
}

/// Rotate a refresh token into a fresh pair.
///
/// The presented token's session is revoked; a replayed token rejects.
#[utoipa::path(post, path = "/api/v1/auth/refresh", tag = "Auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "Token pair rotated", body = RefreshResponse),
        (status = 400, description = "Missing refresh token"),
        (status = 401, description = "Invalid, expired, or revoked token"),
    ))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let token = req.refresh.as_deref().unwrap_or("").trim().to_string();
    if token.is_empty() {
        return Err(ApiError::BadRequest("Refresh token is required.".to_string()));
    }

    let tokens = state
        .db
        .sessions
        .refresh_session(&token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Token is invalid or expired".to_string()))?;

    Ok(Json(RefreshResponse {
        access: tokens.access_token,
        refresh: tokens.refresh_token,
    }))
}

/// Revoke the session holding this refresh token.
#[utoipa::path(post, path = "/api/v1/auth/signout", tag = "Auth",
    request_body = RefreshTokenRequest,
    responses(
        (status = 204, description = "Session revoked"),
        (status = 400, description = "Missing or invalid refresh token"),
        (status = 401, description = "Not signed in"),
    ))]
pub async fn signout(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<StatusCode, ApiError> {
    let token = req.refresh.as_deref().unwrap_or("").trim().to_string();
    if token.is_empty() {
        return Err(ApiError::BadRequest("Refresh token is required.".to_string()));
    }

    let revoked = state
        .db
        .sessions
        .revoke_by_refresh_token(&token, "signout")
        .await?;
    if !revoked {
        return Err(ApiError::BadRequest("Invalid refresh token.".to_string()));
    }

    info!(subsystem = "api", user_id = %user.user_id, "Signed out");

    Ok(StatusCode::NO_CONTENT)
}

/// Current account profile.
#[utoipa::path(get, path = "/api/v1/auth/me", tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not signed in"),
    ))]
pub async fn me(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<UserProfile>, ApiError> {
    let account = state
        .db
        .users
        .find_by_id(user.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Token is invalid or expired".to_string()))?;

    Ok(Json(UserProfile::from(&account)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_shape_accepts_plain_addresses() {
        for email in ["ada@example.com", "a@b", "first.last@sub.domain.org"] {
            assert!(email_is_valid(email), "{} should be valid", email);
        }
    }

    #[test]
    fn test_email_shape_rejects_malformed() {
        for email in ["", "plain", "@nodomain", "nolocal@", "two@@ats", "a@b@c", "has space@x.com"] {
            assert!(!email_is_valid(email), "{} should be rejected", email);
        }
    }
}
