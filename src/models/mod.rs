use crate::services::staging::StagingGuard;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use validator::Validate;

/// Basic-auth credentials for the video host, forwarded verbatim.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// File part of an upload form, already streamed into staging.
#[derive(Debug)]
pub struct IncomingFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub size_bytes: u64,
    pub staged: StagingGuard,
}

/// Multipart fields as received. Text fields are not validated yet.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub file: Option<IncomingFile>,
}

impl UploadForm {
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|v| !v.is_empty());
        present(&self.username) && present(&self.password)
    }
}

/// Remote transcoding state as reported by the video host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum JobStatus {
    Uploading,
    Processing,
    Ready,
    Failed,
    Unknown(i64),
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Ready | JobStatus::Failed)
    }
}

impl From<i64> for JobStatus {
    fn from(code: i64) -> Self {
        match code {
            0 => JobStatus::Uploading,
            1 => JobStatus::Processing,
            2 => JobStatus::Ready,
            3 => JobStatus::Failed,
            other => JobStatus::Unknown(other),
        }
    }
}

impl From<JobStatus> for i64 {
    fn from(status: JobStatus) -> Self {
        match status {
            JobStatus::Uploading => 0,
            JobStatus::Processing => 1,
            JobStatus::Ready => 2,
            JobStatus::Failed => 3,
            JobStatus::Unknown(code) => code,
        }
    }
}

/// A video job on the remote host. Everything the host returns besides the
/// status and message is kept in `details` so it can be echoed back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteJob {
    #[serde(default)]
    pub shortcode: String,
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl RemoteJob {
    pub fn new(shortcode: impl Into<String>, status: JobStatus) -> Self {
        Self {
            shortcode: shortcode.into(),
            status,
            message: None,
            details: serde_json::Map::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Terminal result of driving a remote job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success { url: String, shortcode: String },
    Failure { reason: String },
    Timeout,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadResponse {
    pub url: String,
    pub shortcode: String,
}

/// Multipart body accepted by `POST /api/upload` (documentation only).
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadVideoForm {
    pub username: String,
    pub password: String,
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct LookupRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "shortcode is required"))]
    pub shortcode: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

impl LookupRequest {
    pub fn credentials(&self) -> Credentials {
        Credentials::new(self.username.clone(), self.password.clone())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}
