use crate::config::RelayConfig;
use crate::services::staging::LocalStagingStore;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

pub async fn setup_staging(config: &RelayConfig) -> Result<Arc<LocalStagingStore>> {
    tokio::fs::create_dir_all(&config.staging_dir)
        .await
        .with_context(|| format!("Failed to create staging directory {:?}", config.staging_dir))?;

    info!(
        "📁 Staging: {:?} (swept every {}s, max age {}h)",
        config.staging_dir, config.staging_sweep_interval_secs, config.staging_cleanup_age_hours
    );

    Ok(Arc::new(LocalStagingStore::new(&config.staging_dir)))
}
