use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::services::poller::PollSettings;
use crate::utils::validation::MAX_FILE_SIZE;

/// Runtime configuration for the relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Maximum file size in bytes (default: 500 MiB)
    pub max_file_size: u64,

    /// Directory for transient staged uploads (default: "temp")
    pub staging_dir: PathBuf,

    /// Staged files older than this are swept (default: 24)
    pub staging_cleanup_age_hours: u64,

    /// How often the staging sweeper runs in seconds (default: 3600)
    pub staging_sweep_interval_secs: u64,

    /// Video host API base URL (default: "https://api.streamable.com")
    pub api_base_url: String,

    /// Base of the public playback URL (default: "https://streamable.com")
    pub share_base_url: String,

    /// Delay between status queries in milliseconds (default: 1000)
    pub poll_interval_ms: u64,

    /// Status queries before giving up (default: 60)
    pub max_poll_attempts: u32,

    /// Timeout for a single status query in seconds (default: 30)
    pub request_timeout_secs: u64,

    /// TCP connect timeout towards the video host in seconds (default: 10)
    pub connect_timeout_secs: u64,

    /// Allowed CORS Origins (comma separated, "*" for any)
    pub allowed_origins: Vec<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            staging_dir: PathBuf::from("temp"),
            staging_cleanup_age_hours: 24,
            staging_sweep_interval_secs: 3600,
            api_base_url: "https://api.streamable.com".to_string(),
            share_base_url: "https://streamable.com".to_string(),
            poll_interval_ms: 1000,
            max_poll_attempts: 60,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

fn parsed<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(fallback)
}

impl RelayConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            max_file_size: parsed("MAX_FILE_SIZE", default.max_file_size),

            staging_dir: env::var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.staging_dir),

            staging_cleanup_age_hours: parsed(
                "STAGING_CLEANUP_AGE_HOURS",
                default.staging_cleanup_age_hours,
            ),

            staging_sweep_interval_secs: parsed(
                "STAGING_SWEEP_INTERVAL_SECS",
                default.staging_sweep_interval_secs,
            ),

            api_base_url: env::var("STREAMABLE_API_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.api_base_url),

            share_base_url: env::var("STREAMABLE_SHARE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(default.share_base_url),

            poll_interval_ms: parsed("POLL_INTERVAL_MS", default.poll_interval_ms),

            max_poll_attempts: parsed("MAX_POLL_ATTEMPTS", default.max_poll_attempts),

            request_timeout_secs: parsed("REQUEST_TIMEOUT_SECS", default.request_timeout_secs),

            connect_timeout_secs: parsed("CONNECT_TIMEOUT_SECS", default.connect_timeout_secs),

            allowed_origins: env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or(default.allowed_origins),
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        PollSettings {
            interval: Duration::from_millis(self.poll_interval_ms),
            max_attempts: self.max_poll_attempts,
        }
    }

    pub fn staging_max_age(&self) -> Duration {
        Duration::from_secs(self.staging_cleanup_age_hours * 3600)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}
