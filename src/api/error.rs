use crate::services::video_host::RemoteError;
use crate::utils::validation::ValidationError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Upload failed: {0}")]
    UploadFailed(RemoteError),

    #[error("Upload failed: No shortcode received")]
    MissingShortcode,

    #[error("Processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Processing timeout")]
    ProcessingTimeout,

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Method Not Allowed: {0}")]
    MethodNotAllowed(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            AppError::UploadFailed(_)
            | AppError::MissingShortcode
            | AppError::ProcessingFailed(_)
            | AppError::ProcessingTimeout
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<RemoteError> for AppError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::MissingShortcode => AppError::MissingShortcode,
            other => AppError::UploadFailed(other),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match self {
            AppError::Validation(e) => e.message,
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::MethodNotAllowed(msg) => msg,
            AppError::UploadFailed(e) => {
                tracing::error!("Upload error: {}", e);
                format!("Streamable upload failed: {}", e)
            }
            AppError::MissingShortcode => {
                tracing::error!("Upload returned no shortcode");
                "Upload failed: No shortcode received".to_string()
            }
            AppError::ProcessingFailed(reason) => reason,
            AppError::ProcessingTimeout => {
                "Processing timeout - video may still be processing".to_string()
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                "Internal server error".to_string()
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}
