//! Background pool refresh loop
//!
//! Fetches candidates and refreshes the pool, then sleeps for the configured
//! interval. Runs until shutdown; a cycle interrupted by shutdown is abandoned
//! and publishes nothing.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use crate::pool::feed::CandidateFeed;
use crate::pool::manager::PoolManager;
use crate::shutdown::wait_for_shutdown;

/// Periodic driver for [`PoolManager::refresh`]
pub struct PoolRefresher {
    manager: Arc<PoolManager>,
    feed: Arc<dyn CandidateFeed>,
    interval: Duration,
}

impl PoolRefresher {
    pub fn new(manager: Arc<PoolManager>, feed: Arc<dyn CandidateFeed>, interval: Duration) -> Self {
        Self {
            manager,
            feed,
            interval,
        }
    }

    /// Run the refresh loop (call in a spawned task)
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Starting pool refresher with {}s interval",
            self.interval.as_secs()
        );

        loop {
            tokio::select! {
                _ = self.run_cycle() => {}
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Pool refresher shutting down, abandoning in-progress cycle");
                    break;
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Pool refresher shutting down");
                    break;
                }
            }
        }
    }

    async fn run_cycle(&self) {
        match self.feed.fetch().await {
            Ok(candidates) => self.manager.refresh(&candidates).await,
            // Keep serving the current pool until the feed recovers.
            Err(e) => error!("Skipping refresh cycle: {}", e),
        }
    }
}
