use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::{credentials::AuthError, storage::StorageError};

/// Everything a handler can fail with. The response body is always
/// `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("[API ERROR] {0}")]
    BadRequest(String),

    #[error("[API ERROR] {}", .0.body_text())]
    InvalidBody(#[from] JsonRejection),

    #[error("{0}")]
    Unauthorized(String),

    #[error("[DB ERROR] {0}")]
    Database(#[from] sqlx::Error),

    #[error("[S3 ERROR] {0}")]
    Storage(#[from] StorageError),

    #[error("[AUTH ERROR] {0}")]
    Provider(String),

    #[error("[TOKEN ERROR] {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) | AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Provider(_)
            | AppError::Token(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        let message = err.to_string();
        match err {
            AuthError::Database(e) => AppError::Database(e),
            AuthError::Provider(msg) => AppError::Provider(msg),
            AuthError::UserExists(_) => AppError::BadRequest(message),
            AuthError::InvalidCredentials => AppError::Unauthorized(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), "{message}");
        } else {
            tracing::warn!(status = status.as_u16(), "{message}");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
