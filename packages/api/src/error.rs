// ABOUTME: Application error type returned by all webhook handlers
// ABOUTME: Maps the error taxonomy onto HTTP status codes with a JSON error body

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::events::EventError;
use crate::signature::SignatureError;
use dealbridge_sync::SyncError;

/// Main application error type that all handlers return.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Downstream sync failure; the webhook source will redeliver.
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<SignatureError> for AppError {
    fn from(err: SignatureError) -> Self {
        match err {
            // Absent headers are a malformed request, not a failed check
            SignatureError::MissingHeader(_) => AppError::Validation(err.to_string()),
            SignatureError::Invalid => AppError::Unauthorized(err.to_string()),
        }
    }
}

impl From<EventError> for AppError {
    fn from(err: EventError) -> Self {
        AppError::Validation(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(message) => {
                warn!("Rejected webhook request: {}", message);
                StatusCode::BAD_REQUEST
            }
            AppError::Unauthorized(message) => {
                warn!("Rejected webhook request: {}", message);
                StatusCode::UNAUTHORIZED
            }
            AppError::Sync(err) => {
                error!("Sync operation failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
