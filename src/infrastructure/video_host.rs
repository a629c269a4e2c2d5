use crate::config::RelayConfig;
use crate::services::video_host::HttpVideoHost;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub fn setup_video_host(config: &RelayConfig) -> Result<Arc<HttpVideoHost>> {
    info!(
        "🎬 Video host: {} (share links under {})",
        config.api_base_url, config.share_base_url
    );

    let host = HttpVideoHost::new(
        &config.api_base_url,
        &config.share_base_url,
        Duration::from_secs(config.connect_timeout_secs),
        Duration::from_secs(config.request_timeout_secs),
    )?;

    Ok(Arc::new(host))
}
