use crate::models::{Credentials, JobStatus, RemoteJob};
use crate::services::staging::StagedFile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{Client, RequestBuilder, Response, StatusCode, header};
use serde::Deserialize;
use std::time::Duration;
use tokio_util::io::ReaderStream;

#[derive(Debug, Clone, thiserror::Error)]
pub enum RemoteError {
    #[error("credentials rejected by video host ({0})")]
    Auth(String),

    #[error("video host responded with {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid response from video host: {0}")]
    Malformed(String),

    #[error("upload response did not include a shortcode")]
    MissingShortcode,

    #[error("network error: {0}")]
    Network(String),

    #[error("could not read staged file: {0}")]
    Staging(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Network(e.to_string())
    }
}

/// The external video hosting API.
#[async_trait]
pub trait VideoHost: Send + Sync {
    /// Upload a staged file. One attempt, no retry.
    async fn upload(
        &self,
        staged: &StagedFile,
        credentials: &Credentials,
    ) -> Result<RemoteJob, RemoteError>;

    /// Fetch the current state of a job
    async fn status(
        &self,
        shortcode: &str,
        credentials: &Credentials,
    ) -> Result<RemoteJob, RemoteError>;

    /// Public playback URL for a shortcode
    fn share_url(&self, shortcode: &str) -> String;
}

#[derive(Deserialize)]
struct UploadReceipt {
    shortcode: Option<String>,
    status: Option<i64>,
}

/// Streamable-compatible HTTP client
pub struct HttpVideoHost {
    client: Client,
    api_base: String,
    share_base: String,
    request_timeout: Duration,
}

impl HttpVideoHost {
    pub fn new(
        api_base: &str,
        share_base: &str,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        // No overall timeout on the client: uploads of large files run as long as they need
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("streamable-relay/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            api_base: api_base.trim_end_matches('/').to_string(),
            share_base: share_base.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    fn authed(&self, request: RequestBuilder, credentials: &Credentials) -> RequestBuilder {
        request
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header(header::ACCEPT, "application/json")
    }

    /// Map non-success statuses onto the error taxonomy and return the body bytes otherwise.
    async fn checked_body(response: Response) -> Result<bytes::Bytes, RemoteError> {
        let status = response.status();
        let body = response.bytes().await?;

        if status.is_success() {
            return Ok(body);
        }

        let message = remote_message(&body).unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_string()
        });

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RemoteError::Auth(message));
        }

        Err(RemoteError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// Everything outside the RFC 3986 unreserved set is escaped in a path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Encode a shortcode as exactly one path segment. Dot-only segments are
/// refused, URL parsing would resolve them against the parent path.
fn shortcode_segment(shortcode: &str) -> Result<String, RemoteError> {
    if shortcode.is_empty() || shortcode.chars().all(|c| c == '.') {
        return Err(RemoteError::Rejected {
            status: 400,
            message: format!("Invalid shortcode {:?}", shortcode),
        });
    }
    Ok(utf8_percent_encode(shortcode, PATH_SEGMENT).to_string())
}

/// Pull a human readable message out of an error body, JSON or plain text.
fn remote_message(body: &[u8]) -> Option<String> {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        return ["message", "error"]
            .iter()
            .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string);
    }
    let text = String::from_utf8_lossy(body).trim().to_string();
    (!text.is_empty()).then_some(text)
}

#[async_trait]
impl VideoHost for HttpVideoHost {
    async fn upload(
        &self,
        staged: &StagedFile,
        credentials: &Credentials,
    ) -> Result<RemoteJob, RemoteError> {
        let file = tokio::fs::File::open(&staged.path)
            .await
            .map_err(|e| RemoteError::Staging(e.to_string()))?;
        let length = file
            .metadata()
            .await
            .map_err(|e| RemoteError::Staging(e.to_string()))?
            .len();

        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = reqwest::multipart::Part::stream_with_length(body, length)
            .file_name(staged.file_name.clone());
        let form = reqwest::multipart::Form::new().part("file", part);

        tracing::info!(
            "Uploading {} ({} bytes) to {}/upload as {}",
            staged.file_name,
            length,
            self.api_base,
            credentials.username
        );

        let request = self
            .client
            .post(format!("{}/upload", self.api_base))
            .multipart(form);
        let response = self.authed(request, credentials).send().await?;
        let body = Self::checked_body(response).await?;

        let receipt: UploadReceipt = serde_json::from_slice(&body)
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;

        let shortcode = receipt
            .shortcode
            .filter(|s| !s.is_empty())
            .ok_or(RemoteError::MissingShortcode)?;

        let status = receipt.status.map(JobStatus::from).unwrap_or(JobStatus::Uploading);
        Ok(RemoteJob::new(shortcode, status))
    }

    async fn status(
        &self,
        shortcode: &str,
        credentials: &Credentials,
    ) -> Result<RemoteJob, RemoteError> {
        let segment = shortcode_segment(shortcode)?;
        let request = self
            .client
            .get(format!("{}/videos/{}", self.api_base, segment))
            .timeout(self.request_timeout);
        let response = self.authed(request, credentials).send().await?;
        let body = Self::checked_body(response).await?;

        let mut job: RemoteJob = serde_json::from_slice(&body)
            .map_err(|e| RemoteError::Malformed(e.to_string()))?;
        if job.shortcode.is_empty() {
            job.shortcode = shortcode.to_string();
        }

        tracing::debug!("Status for {}: {:?}", shortcode, job.status);
        Ok(job)
    }

    fn share_url(&self, shortcode: &str) -> String {
        format!("{}/{}", self.share_base, shortcode)
    }
}
