use crate::api::error::AppError;
use crate::models::{
    Credentials, IncomingFile, JobStatus, LookupRequest, RemoteJob, UploadForm, UploadOutcome,
    UploadResponse,
};
use crate::services::poller::{PollSettings, StatusPoller};
use crate::services::staging::{StagedFile, StagingGuard, StagingStore};
use crate::services::video_host::{RemoteError, VideoHost};
use crate::utils::validation::{
    EXECUTABLE_SNIFF_LEN, ValidationError, is_executable_content, required_credentials,
    sanitize_filename, validate_file_size, validate_video_type,
};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::io::StreamReader;
use validator::Validate;

/// Wait after a successful upload before the staged copy is deleted. The host
/// may still be finalizing when it first reports the video as ready.
pub const SUCCESS_RELEASE_GRACE: Duration = Duration::from_secs(1);

pub const LOOKUP_NOT_FOUND_MESSAGE: &str = "Video not found or failed";

/// Turn a failed `stage` back into the rejection that aborted the stream, if any.
fn staging_error(file_name: &str, e: io::Error) -> AppError {
    let rejected = e
        .get_ref()
        .is_some_and(|inner| inner.is::<ValidationError>() || inner.is::<AppError>());
    if !rejected {
        return AppError::Internal(format!("Failed to stage {}: {}", file_name, e));
    }

    match e.into_inner().map(|inner| inner.downcast::<ValidationError>()) {
        Some(Ok(validation)) => AppError::Validation(*validation),
        Some(Err(inner)) => match inner.downcast::<AppError>() {
            Ok(app) => *app,
            Err(other) => AppError::Internal(format!("Failed to stage {}: {}", file_name, other)),
        },
        None => AppError::Internal(format!("Failed to stage {}", file_name)),
    }
}

/// Stage, upload, poll, release: one request/response cycle.
pub struct UploadOrchestrator {
    staging: Arc<dyn StagingStore>,
    host: Arc<dyn VideoHost>,
    poller: StatusPoller,
    max_file_size: u64,
}

impl UploadOrchestrator {
    pub fn new(
        staging: Arc<dyn StagingStore>,
        host: Arc<dyn VideoHost>,
        poll: PollSettings,
        max_file_size: u64,
    ) -> Self {
        Self {
            poller: StatusPoller::new(host.clone(), poll),
            staging,
            host,
            max_file_size,
        }
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    pub fn staging(&self) -> &Arc<dyn StagingStore> {
        &self.staging
    }

    /// Streams one file part into staging.
    ///
    /// Type and name are checked before anything is written. The size limit
    /// and the executable check run on the bytes as they pass, and a rejected
    /// part leaves nothing behind in staging.
    pub async fn stage_file_part<S>(
        &self,
        file_name: &str,
        content_type: Option<&str>,
        body: S,
    ) -> Result<IncomingFile, AppError>
    where
        S: Stream<Item = Result<Bytes, io::Error>> + Send,
    {
        validate_video_type(file_name, content_type)?;
        let file_name = sanitize_filename(file_name)?;

        let max_file_size = self.max_file_size;
        let mut received: u64 = 0;
        let mut head = Vec::with_capacity(EXECUTABLE_SNIFF_LEN);

        let checked = body.map(move |chunk: io::Result<Bytes>| -> io::Result<Bytes> {
            let chunk = chunk?;

            if head.len() < EXECUTABLE_SNIFF_LEN {
                let take = (EXECUTABLE_SNIFF_LEN - head.len()).min(chunk.len());
                head.extend_from_slice(&chunk[..take]);
                if is_executable_content(&head) {
                    return Err(io::Error::other(ValidationError::executable_content()));
                }
            }

            received += chunk.len() as u64;
            validate_file_size(received, max_file_size).map_err(io::Error::other)?;
            Ok(chunk)
        });

        let staged = self
            .staging
            .stage(&file_name, Box::new(StreamReader::new(Box::pin(checked))))
            .await
            .map_err(|e| staging_error(&file_name, e))?;

        tracing::debug!("Received {} ({} bytes)", file_name, staged.size_bytes);

        Ok(IncomingFile {
            file_name,
            content_type: content_type.map(str::to_string),
            size_bytes: staged.size_bytes,
            staged: StagingGuard::new(self.staging.clone(), staged),
        })
    }

    /// Relays a received form and waits for the remote job.
    ///
    /// Nothing reaches the host unless every field is present. The staged
    /// file is released exactly once whatever the outcome; on success the
    /// release waits `SUCCESS_RELEASE_GRACE` first.
    pub async fn handle_upload(&self, form: UploadForm) -> Result<UploadOutcome, AppError> {
        let UploadForm {
            username,
            password,
            file,
        } = form;

        let Some(file) = file else {
            return Err(ValidationError::missing_fields().into());
        };

        let credentials = match required_credentials(username, password) {
            Ok(credentials) => credentials,
            Err(e) => {
                file.staged.release().await;
                return Err(e.into());
            }
        };

        tracing::info!(
            "Relaying {} ({} bytes) for {}",
            file.file_name,
            file.size_bytes,
            credentials.username
        );

        let result = self.relay(file.staged.file(), &credentials).await;

        if let Ok(UploadOutcome::Success { .. }) = &result {
            tokio::time::sleep(SUCCESS_RELEASE_GRACE).await;
        }
        file.staged.release().await;

        result
    }

    async fn relay(
        &self,
        staged: &StagedFile,
        credentials: &Credentials,
    ) -> Result<UploadOutcome, AppError> {
        let job = self.host.upload(staged, credentials).await?;
        tracing::info!("Upload successful, shortcode: {}", job.shortcode);

        Ok(self
            .poller
            .poll_until_terminal(&job.shortcode, credentials)
            .await)
    }

    /// Single authenticated read of an existing video. Failed videos and
    /// rejected queries are reported as not found.
    pub async fn lookup(&self, request: LookupRequest) -> Result<RemoteJob, AppError> {
        request
            .validate()
            .map_err(|_| AppError::BadRequest("Missing required fields".to_string()))?;

        let credentials = request.credentials();
        match self.host.status(&request.shortcode, &credentials).await {
            Ok(job) if job.status == JobStatus::Failed => Err(AppError::NotFound(
                job.message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| LOOKUP_NOT_FOUND_MESSAGE.to_string()),
            )),
            Ok(job) => Ok(job),
            Err(RemoteError::Auth(message)) | Err(RemoteError::Rejected { message, .. }) => {
                tracing::info!("Lookup of {} rejected: {}", request.shortcode, message);
                Err(AppError::NotFound(message))
            }
            Err(e) => Err(AppError::Internal(format!(
                "Lookup of {} failed: {}",
                request.shortcode, e
            ))),
        }
    }
}

impl UploadOutcome {
    /// Map a terminal outcome onto the HTTP error taxonomy.
    pub fn into_result(self) -> Result<UploadResponse, AppError> {
        match self {
            UploadOutcome::Success { url, shortcode } => Ok(UploadResponse { url, shortcode }),
            UploadOutcome::Failure { reason } => Err(AppError::ProcessingFailed(reason)),
            UploadOutcome::Timeout => Err(AppError::ProcessingTimeout),
        }
    }
}
