//! API error type and HTTP status mapping.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// API-level error, mapped to an HTTP status and a `{"error": ...}` body.
#[derive(Debug)]
pub enum ApiError {
    Database(cairn_core::Error),
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<cairn_core::Error> for ApiError {
    fn from(err: cairn_core::Error) -> Self {
        match &err {
            cairn_core::Error::NotFound(_)
            | cairn_core::Error::NoteNotFound(_)
            | cairn_core::Error::AttachmentNotFound(_) => ApiError::NotFound(err.to_string()),
            cairn_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            cairn_core::Error::Unauthorized(msg) => ApiError::Unauthorized(msg.clone()),
            cairn_core::Error::Database(sqlx_err) => {
                let msg = sqlx_err.to_string();
                if msg.contains("duplicate key") || msg.contains("unique constraint") {
                    // The email pre-check can lose a race to a concurrent signup.
                    let friendly = if msg.contains("app_user_email") || msg.contains("email") {
                        "A user with this email already exists.".to_string()
                    } else {
                        msg
                    };
                    return ApiError::Conflict(friendly);
                }
                ApiError::Database(err)
            }
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_note_not_found_maps_to_404() {
        let err: ApiError = cairn_core::Error::NoteNotFound(Uuid::nil()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_attachment_not_found_maps_to_404() {
        let err: ApiError = cairn_core::Error::AttachmentNotFound(Uuid::nil()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_input_maps_to_400() {
        let err: ApiError = cairn_core::Error::InvalidInput("bad title".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_unauthorized_maps_to_401() {
        let err: ApiError = cairn_core::Error::Unauthorized("expired".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_unexpected_core_error_maps_to_500() {
        let err: ApiError = cairn_core::Error::Internal("boom".to_string()).into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
