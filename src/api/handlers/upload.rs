use crate::AppState;
use crate::api::error::AppError;
use crate::models::{UploadForm, UploadResponse};
use crate::services::orchestrator::UploadOrchestrator;
use crate::utils::validation::ValidationError;
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
};
use futures::TryStreamExt;
use std::io;

fn multipart_error(e: MultipartError, max_file_size: u64) -> AppError {
    let err_msg = e.to_string();
    if err_msg.contains("length limit exceeded") {
        AppError::Validation(ValidationError::file_too_large(max_file_size))
    } else {
        AppError::BadRequest(err_msg)
    }
}

/// Collect the three known fields into `form`. Unknown fields are skipped.
/// The file part is streamed straight into staging. A rejected file part is
/// reported only after the rest of the form was read, so missing credentials
/// take precedence.
async fn read_upload_form(
    multipart: &mut Multipart,
    orchestrator: &UploadOrchestrator,
    form: &mut UploadForm,
) -> Result<(), AppError> {
    let max_file_size = orchestrator.max_file_size();
    let mut rejected: Option<AppError> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, max_file_size))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "username" | "password" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(e, max_file_size))?;
                if name == "username" {
                    form.username = Some(text);
                } else {
                    form.password = Some(text);
                }
            }
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                // Browsers send an unnamed, empty part when no file was chosen
                if file_name.is_empty() {
                    tracing::debug!("Ignoring file part without a file name");
                    continue;
                }
                if form.file.is_some() || rejected.is_some() {
                    tracing::debug!("Ignoring extra file part {:?}", file_name);
                    continue;
                }

                let content_type = field.content_type().map(|s| s.to_string());
                let body = field.map_err(|e| io::Error::other(multipart_error(e, max_file_size)));

                match orchestrator
                    .stage_file_part(&file_name, content_type.as_deref(), body)
                    .await
                {
                    Ok(file) => form.file = Some(file),
                    Err(AppError::Validation(e)) => {
                        tracing::warn!("Rejected file part {:?}: {}", file_name, e);
                        rejected = Some(AppError::Validation(e));
                    }
                    Err(e) => return Err(e),
                }
            }
            other => {
                tracing::debug!("Ignoring unexpected multipart field {:?}", other);
            }
        }
    }

    match rejected {
        Some(_) if !form.has_credentials() => Err(ValidationError::missing_fields().into()),
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[utoipa::path(
    post,
    path = "/api/upload",
    request_body(content = crate::models::UploadVideoForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Video uploaded and processed", body = UploadResponse),
        (status = 400, description = "Missing fields, file too large or not a video",
            body = crate::models::ErrorResponse),
        (status = 500, description = "Upload, processing or timeout failure",
            body = crate::models::ErrorResponse)
    ),
    tag = "videos"
)]
pub async fn upload_video(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| {
        tracing::warn!("Rejected upload request without a multipart body: {}", e);
        AppError::Validation(ValidationError::missing_fields())
    })?;

    let mut form = UploadForm::default();
    if let Err(e) = read_upload_form(&mut multipart, &state.orchestrator, &mut form).await {
        if let Some(file) = form.file.take() {
            file.staged.release().await;
        }

        // Drain the rest of the body before answering
        tracing::warn!("Upload failed early: {}. Consuming remaining stream...", e);
        while let Ok(Some(mut field)) = multipart.next_field().await {
            while let Ok(Some(_)) = field.chunk().await {}
        }
        return Err(e);
    }

    let outcome = state.orchestrator.handle_upload(form).await?;
    Ok(Json(outcome.into_result()?))
}

pub async fn upload_method_not_allowed(method: axum::http::Method) -> AppError {
    AppError::MethodNotAllowed(format!(
        "{} method not supported. Use POST to upload videos.",
        method
    ))
}
