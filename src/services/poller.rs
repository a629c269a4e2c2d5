use crate::models::{Credentials, JobStatus, UploadOutcome};
use crate::services::video_host::VideoHost;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_POLL_ATTEMPTS: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_attempts: DEFAULT_MAX_POLL_ATTEMPTS,
        }
    }
}

/// Drives a remote job to a terminal state with fixed-interval status queries.
pub struct StatusPoller {
    host: Arc<dyn VideoHost>,
    settings: PollSettings,
}

impl StatusPoller {
    pub fn new(host: Arc<dyn VideoHost>, settings: PollSettings) -> Self {
        Self { host, settings }
    }

    pub fn settings(&self) -> PollSettings {
        self.settings
    }

    /// Each attempt waits one interval and then issues exactly one query; the
    /// next wait starts only after that query returned. A query error ends
    /// polling at once.
    pub async fn poll_until_terminal(
        &self,
        shortcode: &str,
        credentials: &Credentials,
    ) -> UploadOutcome {
        for attempt in 1..=self.settings.max_attempts {
            tokio::time::sleep(self.settings.interval).await;

            let job = match self.host.status(shortcode, credentials).await {
                Ok(job) => job,
                Err(e) => {
                    tracing::error!(
                        "Status check error for {} on attempt {}: {}",
                        shortcode,
                        attempt,
                        e
                    );
                    return UploadOutcome::Failure {
                        reason: format!("Error checking processing status: {}", e),
                    };
                }
            };

            if !job.status.is_terminal() {
                tracing::debug!(
                    "{} still pending ({:?}), attempt {}/{}",
                    shortcode,
                    job.status,
                    attempt,
                    self.settings.max_attempts
                );
                continue;
            }

            if job.status == JobStatus::Ready {
                tracing::info!("{} processed after {} status checks", shortcode, attempt);
                return UploadOutcome::Success {
                    url: self.host.share_url(shortcode),
                    shortcode: shortcode.to_string(),
                };
            }

            let reason = job
                .message
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| "Video processing failed".to_string());
            tracing::warn!("{} failed remote processing: {}", shortcode, reason);
            return UploadOutcome::Failure { reason };
        }

        tracing::warn!(
            "{} still processing after {} status checks, giving up",
            shortcode,
            self.settings.max_attempts
        );
        UploadOutcome::Timeout
    }
}
