use crate::AppState;
use crate::api::error::AppError;
use crate::models::{LookupRequest, RemoteJob};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::Method,
};

#[utoipa::path(
    post,
    path = "/api/videos",
    request_body = LookupRequest,
    responses(
        (status = 200, description = "Video details as reported by Streamable"),
        (status = 400, description = "Missing required fields",
            body = crate::models::ErrorResponse),
        (status = 404, description = "Video not found or failed",
            body = crate::models::ErrorResponse),
        (status = 500, description = "Internal server error",
            body = crate::models::ErrorResponse)
    ),
    tag = "videos"
)]
pub async fn lookup_video(
    State(state): State<AppState>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Result<Json<RemoteJob>, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::warn!("Unreadable lookup body: {}", e);
        AppError::BadRequest("Missing required fields".to_string())
    })?;

    let job = state.orchestrator.lookup(request).await?;
    Ok(Json(job))
}

pub async fn videos_method_not_allowed(method: Method) -> AppError {
    AppError::MethodNotAllowed(format!(
        "{} method not supported. Use POST to look up a video.",
        method
    ))
}
