#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use futures::stream::Iter;
use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use streamable_relay::config::RelayConfig;
use streamable_relay::models::{Credentials, JobStatus, RemoteJob};
use streamable_relay::services::orchestrator::UploadOrchestrator;
use streamable_relay::services::poller::PollSettings;
use streamable_relay::services::staging::{LocalStagingStore, StagedFile, StagingStore};
use streamable_relay::services::video_host::{RemoteError, VideoHost};
use streamable_relay::{AppState, create_app};
use tokio::io::AsyncRead;
use tokio::time::Instant;

pub const SHORTCODE: &str = "abc12";

/// In-memory video host that plays back a script of status responses.
/// Once the script runs out every query reports `Processing`.
pub struct ScriptedHost {
    upload_result: Result<RemoteJob, RemoteError>,
    script: Mutex<VecDeque<Result<RemoteJob, RemoteError>>>,
    uploads: AtomicUsize,
    status_queries: AtomicUsize,
    uploaded: Mutex<Vec<u8>>,
    seen_credentials: Mutex<Vec<Credentials>>,
    last_query_at: Mutex<Option<Instant>>,
}

impl ScriptedHost {
    pub fn accepting() -> Self {
        Self::with_upload_result(Ok(RemoteJob::new(SHORTCODE, JobStatus::Uploading)))
    }

    pub fn rejecting_upload(error: RemoteError) -> Self {
        Self::with_upload_result(Err(error))
    }

    fn with_upload_result(upload_result: Result<RemoteJob, RemoteError>) -> Self {
        Self {
            upload_result,
            script: Mutex::new(VecDeque::new()),
            uploads: AtomicUsize::new(0),
            status_queries: AtomicUsize::new(0),
            uploaded: Mutex::new(Vec::new()),
            seen_credentials: Mutex::new(Vec::new()),
            last_query_at: Mutex::new(None),
        }
    }

    pub fn then_statuses(self, codes: &[i64]) -> Self {
        {
            let mut script = self.script.lock().unwrap();
            for code in codes {
                script.push_back(Ok(RemoteJob::new(SHORTCODE, JobStatus::from(*code))));
            }
        }
        self
    }

    pub fn then_job(self, job: RemoteJob) -> Self {
        self.script.lock().unwrap().push_back(Ok(job));
        self
    }

    pub fn then_error(self, error: RemoteError) -> Self {
        self.script.lock().unwrap().push_back(Err(error));
        self
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn status_queries(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    pub fn uploaded_bytes(&self) -> Vec<u8> {
        self.uploaded.lock().unwrap().clone()
    }

    pub fn seen_credentials(&self) -> Vec<Credentials> {
        self.seen_credentials.lock().unwrap().clone()
    }

    pub fn last_query_at(&self) -> Option<Instant> {
        *self.last_query_at.lock().unwrap()
    }
}

#[async_trait]
impl VideoHost for ScriptedHost {
    async fn upload(
        &self,
        staged: &StagedFile,
        credentials: &Credentials,
    ) -> Result<RemoteJob, RemoteError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        self.seen_credentials.lock().unwrap().push(credentials.clone());

        let bytes = tokio::fs::read(&staged.path)
            .await
            .map_err(|e| RemoteError::Staging(e.to_string()))?;
        *self.uploaded.lock().unwrap() = bytes;

        self.upload_result.clone()
    }

    async fn status(
        &self,
        shortcode: &str,
        credentials: &Credentials,
    ) -> Result<RemoteJob, RemoteError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        self.seen_credentials.lock().unwrap().push(credentials.clone());
        *self.last_query_at.lock().unwrap() = Some(Instant::now());

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(RemoteJob::new(shortcode, JobStatus::Processing)))
    }

    fn share_url(&self, shortcode: &str) -> String {
        format!("https://streamable.com/{}", shortcode)
    }
}

/// Local staging that counts stage and release calls.
pub struct CountingStaging {
    inner: LocalStagingStore,
    staged: AtomicUsize,
    released: AtomicUsize,
    released_at: Mutex<Option<Instant>>,
    paths: Mutex<Vec<std::path::PathBuf>>,
}

impl CountingStaging {
    pub fn new(root: &std::path::Path) -> Self {
        Self {
            inner: LocalStagingStore::new(root),
            staged: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
            released_at: Mutex::new(None),
            paths: Mutex::new(Vec::new()),
        }
    }

    pub fn staged(&self) -> usize {
        self.staged.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn released_at(&self) -> Option<Instant> {
        *self.released_at.lock().unwrap()
    }

    pub fn paths(&self) -> Vec<std::path::PathBuf> {
        self.paths.lock().unwrap().clone()
    }
}

#[async_trait]
impl StagingStore for CountingStaging {
    async fn stage<'a>(
        &self,
        file_name: &str,
        reader: Box<dyn AsyncRead + Unpin + Send + 'a>,
    ) -> io::Result<StagedFile> {
        self.staged.fetch_add(1, Ordering::SeqCst);
        let staged = self.inner.stage(file_name, reader).await?;
        self.paths.lock().unwrap().push(staged.path.clone());
        Ok(staged)
    }

    async fn release(&self, staged: &StagedFile) {
        self.released.fetch_add(1, Ordering::SeqCst);
        *self.released_at.lock().unwrap() = Some(Instant::now());
        self.inner.release(staged).await;
    }

    async fn health_check(&self) -> bool {
        self.inner.health_check().await
    }
}

pub fn polling(max_attempts: u32) -> PollSettings {
    PollSettings {
        interval: std::time::Duration::from_millis(1000),
        max_attempts,
    }
}

pub fn orchestrator(
    staging: Arc<CountingStaging>,
    host: Arc<ScriptedHost>,
    poll: PollSettings,
) -> UploadOrchestrator {
    UploadOrchestrator::new(staging, host, poll, RelayConfig::default().max_file_size)
}

pub fn test_app(
    staging: Arc<CountingStaging>,
    host: Arc<ScriptedHost>,
    poll: PollSettings,
) -> Router {
    test_app_with_limit(staging, host, poll, RelayConfig::default().max_file_size)
}

pub fn test_app_with_limit(
    staging: Arc<CountingStaging>,
    host: Arc<ScriptedHost>,
    poll: PollSettings,
    max_file_size: u64,
) -> Router {
    let config = RelayConfig {
        max_file_size,
        poll_interval_ms: poll.interval.as_millis() as u64,
        max_poll_attempts: poll.max_attempts,
        ..RelayConfig::default()
    };

    create_app(AppState {
        orchestrator: Arc::new(UploadOrchestrator::new(staging, host, poll, max_file_size)),
        config: Arc::new(config),
    })
}

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

/// A multipart body. `file` is `(file name, content type, bytes)`.
pub fn multipart_body(
    username: Option<&str>,
    password: Option<&str>,
    file: Option<(&str, &str, &[u8])>,
) -> Vec<u8> {
    let mut body = Vec::new();

    for (name, value) in [("username", username), ("password", password)] {
        if let Some(value) = value {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                     name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
    }

    if let Some((file_name, content_type, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }

    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

pub const MP4_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42\x00\x00\x00\x00isommp42";

/// A file part body delivered in the given chunks.
pub fn body_stream(chunks: &[&'static [u8]]) -> Iter<std::vec::IntoIter<io::Result<Bytes>>> {
    let chunks: Vec<io::Result<Bytes>> = chunks.iter().map(|c| Ok(Bytes::from_static(c))).collect();
    futures::stream::iter(chunks)
}

/// Files currently left in a staging directory.
pub fn files_in(dir: &std::path::Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
