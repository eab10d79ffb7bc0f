// src/error.rs

use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

pub const CLASS_NOT_FOUND: &str = "class_not_found";
pub const LESSON_NOT_FOUND: &str = "lesson_not_found";
pub const QUIZ_NOT_FOUND: &str = "quiz_not_found";
pub const QUESTION_NOT_FOUND: &str = "question_not_found";
pub const QUESTION_ALREADY_ANSWERED: &str = "question_already_answered";
pub const QUIZ_ALREADY_STARTED: &str = "quiz_already_started";
pub const QUIZ_ALREADY_FINISHED: &str = "quiz_already_finished";
pub const QUIZ_BANNED: &str = "quiz_banned";
pub const QUIZ_DEADLINE_EXCEEDED: &str = "quiz_deadline_exceeded";
pub const UNKNOWN_OPTION: &str = "unknown_option";
pub const FORBIDDEN: &str = "forbidden";

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 403 Forbidden (role too low)
    Forbidden(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (duplicate answer, quiz already started, ...)
    Conflict(String),

    // 409 Conflict, the document changed under us. Safe to retry.
    StaleWrite,

    // 422 Unprocessable Entity (malformed payload)
    Validation(String),
}

impl AppError {
    pub fn not_found(code: &str) -> Self {
        AppError::NotFound(code.to_string())
    }

    pub fn conflict(code: &str) -> Self {
        AppError::Conflict(code.to_string())
    }

    pub fn validation(code: &str) -> Self {
        AppError::Validation(code.to_string())
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::InternalServerError(msg)
            | AppError::BadRequest(msg)
            | AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg)
            | AppError::Validation(msg) => f.write_str(msg),
            AppError::StaleWrite => f.write_str("class_modified_concurrently"),
        }
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::StaleWrite => {
                let body = Json(json!({
                    "error": "class_modified_concurrently",
                    "retryable": true,
                }));
                return (StatusCode::CONFLICT, body).into_response();
            }
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}

/// Malformed or mistyped JSON bodies (bad uuid, missing field) surface as 422.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

/// Malformed path segments (a class id that is not a uuid) surface as 400.
impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_the_error_code() {
        assert_eq!(AppError::conflict(QUIZ_BANNED).to_string(), "quiz_banned");
        assert_eq!(AppError::not_found(CLASS_NOT_FOUND).to_string(), "class_not_found");
        assert_eq!(AppError::StaleWrite.to_string(), "class_modified_concurrently");
    }

    #[tokio::test]
    async fn stale_write_is_retryable_conflict() {
        let response = AppError::StaleWrite.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "class_modified_concurrently");
        assert_eq!(body["retryable"], true);
    }
}
