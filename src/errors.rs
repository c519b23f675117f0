use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

/// Caller-visible failure classes. Every `AppError` falls into exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    AuthenticationFailure,
    Conflict,
    NotFound,
    InternalFault,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Unknown email and wrong password both map here.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Forged, expired, revoked or unknown token.
    #[error("invalid token")]
    InvalidToken,

    #[error("account already exists")]
    AlreadyExists,

    #[error("session already running")]
    SessionAlreadyOpen,

    #[error("no open session")]
    NoOpenSession,

    #[error("token not found")]
    TokenNotFound,

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::InvalidInput(_) | AppError::TokenNotFound => ErrorKind::InvalidInput,
            AppError::InvalidCredentials | AppError::InvalidToken => {
                ErrorKind::AuthenticationFailure
            }
            AppError::AlreadyExists | AppError::SessionAlreadyOpen => ErrorKind::Conflict,
            AppError::NoOpenSession => ErrorKind::NotFound,
            AppError::Database(_) | AppError::Internal(_) => ErrorKind::InternalFault,
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Database(e) => AppError::Database(e),
            // Callers that expect a duplicate translate it themselves.
            StoreError::Duplicate => {
                AppError::Internal(anyhow::anyhow!("unexpected unique constraint violation"))
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code, msg) = match &self {
            AppError::InvalidInput(reason) => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "invalid_input",
                reason.clone(),
            ),
            AppError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_credentials",
                "invalid credentials".to_string(),
            ),
            AppError::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "authentication_error",
                "invalid_token",
                "invalid or missing token".to_string(),
            ),
            AppError::AlreadyExists => (
                StatusCode::CONFLICT,
                "conflict_error",
                "email_taken",
                "email already registered".to_string(),
            ),
            AppError::SessionAlreadyOpen => (
                StatusCode::CONFLICT,
                "conflict_error",
                "session_already_running",
                "session already running".to_string(),
            ),
            AppError::NoOpenSession => (
                StatusCode::NOT_FOUND,
                "not_found_error",
                "no_open_session",
                "no open session".to_string(),
            ),
            AppError::TokenNotFound => (
                StatusCode::BAD_REQUEST,
                "invalid_request_error",
                "token_not_found",
                "no identifiable token".to_string(),
            ),
            AppError::Database(e) => {
                tracing::error!("Database error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "internal_server_error",
                    "internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "message": msg,
                "type": error_type,
                "code": code,
            }
        }));

        (status, body).into_response()
    }
}
