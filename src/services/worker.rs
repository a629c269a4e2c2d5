use crate::services::staging::LocalStagingStore;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep};

/// Periodically removes staged files left behind by crashed or killed requests.
pub struct StagingSweeper {
    staging: Arc<LocalStagingStore>,
    interval: Duration,
    max_age: Duration,
    shutdown: watch::Receiver<bool>,
}

impl StagingSweeper {
    pub fn new(
        staging: Arc<LocalStagingStore>,
        interval: Duration,
        max_age: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            staging,
            interval,
            max_age,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(
            "🚀 Staging sweeper started (every {:?}, max age {:?})",
            self.interval,
            self.max_age
        );

        // Leftovers from a previous run are swept right away
        self.sweep().await;

        loop {
            tokio::select! {
                _ = self.shutdown.changed() => {
                    tracing::info!("🛑 Staging sweeper shutting down");
                    break;
                }
                _ = sleep(self.interval) => {
                    self.sweep().await;
                }
            }
        }
    }

    pub async fn sweep(&self) -> usize {
        match self.staging.sweep_stale(self.max_age).await {
            Ok(0) => 0,
            Ok(removed) => {
                tracing::info!("🧹 Swept {} stale staged file(s)", removed);
                removed
            }
            Err(e) => {
                tracing::error!("Staging sweep failed for {:?}: {}", self.staging.root(), e);
                0
            }
        }
    }
}
