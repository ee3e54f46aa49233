//! Pool manager
//!
//! Turns a batch of raw candidate addresses into the next pool snapshot.
//! Probing runs without the pool lock; only the final swap takes it, so
//! request handlers keep selecting from the previous snapshot meanwhile.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::models::ProxyAddress;
use crate::pool::probe::HealthProbe;
use crate::pool::state::ProxyPool;

/// Owns refreshes of the shared [`ProxyPool`]
pub struct PoolManager {
    pool: Arc<ProxyPool>,
    probe: Arc<dyn HealthProbe>,
}

impl PoolManager {
    pub fn new(pool: Arc<ProxyPool>, probe: Arc<dyn HealthProbe>) -> Self {
        Self { pool, probe }
    }

    pub fn pool(&self) -> &Arc<ProxyPool> {
        &self.pool
    }

    /// Validate `candidates` one by one and publish the survivors as the new pool
    ///
    /// Malformed or failing candidates are logged and dropped. Nothing from the
    /// previous pool survives unless it is in `candidates` and passes again.
    #[instrument(skip(self, candidates), fields(candidates = candidates.len()))]
    pub async fn refresh<S: AsRef<str>>(&self, candidates: &[S]) {
        let mut validated = Vec::with_capacity(candidates.len());

        for raw in candidates {
            let raw = raw.as_ref();

            let proxy = match ProxyAddress::parse(raw) {
                Ok(proxy) => proxy,
                Err(e) => {
                    warn!("Dropping candidate {:?}: {}", raw, e);
                    continue;
                }
            };

            match self.probe.probe(&proxy).await {
                Ok(()) => validated.push(proxy),
                Err(e) => warn!("Dropping candidate {}: {}", proxy, e),
            }
        }

        let accepted = validated.len();
        let previous = self.pool.replace(validated);

        info!(
            "Pool refreshed: {} of {} candidates accepted ({} rejected, previous size {})",
            accepted,
            candidates.len(),
            candidates.len() - accepted,
            previous
        );
    }
}
