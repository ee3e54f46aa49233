//! Shared proxy pool state
//!
//! The pool is the only state shared between the refresh task and request
//! handlers. One mutex guards it; every critical section is a clone of the
//! first entry or a whole-vector swap.

use parking_lot::Mutex;

use crate::error::{GatewayError, Result};
use crate::models::ProxyAddress;

/// Trait for handing out an upstream proxy per request
///
/// The gateway only depends on this seam, so tests can count or script selections.
pub trait ProxySelector: Send + Sync {
    /// Select a proxy from the current pool
    ///
    /// Returns `NoProxyAvailable` if the pool is empty
    fn select(&self) -> Result<ProxyAddress>;

    /// Get the number of proxies currently in the pool
    fn available_count(&self) -> usize;
}

/// Ordered set of validated upstream proxies
#[derive(Debug, Default)]
pub struct ProxyPool {
    proxies: Mutex<Vec<ProxyAddress>>,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pool that already holds the given proxies
    pub fn with_proxies(proxies: Vec<ProxyAddress>) -> Self {
        Self {
            proxies: Mutex::new(proxies),
        }
    }

    /// Replace the whole pool in one swap, returning the previous size
    pub fn replace(&self, proxies: Vec<ProxyAddress>) -> usize {
        let previous = std::mem::replace(&mut *self.proxies.lock(), proxies);
        previous.len()
    }

    /// Copy of the current pool, in selection order
    pub fn snapshot(&self) -> Vec<ProxyAddress> {
        self.proxies.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.proxies.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.proxies.lock().is_empty()
    }
}

impl ProxySelector for ProxyPool {
    // Selection is positional: the first entry until the next refresh replaces it.
    fn select(&self) -> Result<ProxyAddress> {
        self.proxies
            .lock()
            .first()
            .cloned()
            .ok_or(GatewayError::NoProxyAvailable)
    }

    fn available_count(&self) -> usize {
        self.len()
    }
}
