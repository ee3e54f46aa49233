//! Upstream proxy pool
//!
//! This module provides the proxy-pool lifecycle:
//! - Shared pool state with positional selection
//! - Health probing of candidates through themselves
//! - Refresh cycles that publish the validated subset atomically
//! - Candidate feeds and the periodic refresh task

pub mod feed;
pub mod manager;
pub mod probe;
pub mod refresher;
pub mod state;

pub use feed::{CandidateFeed, FileFeed, StaticFeed};
pub use manager::PoolManager;
pub use probe::{HealthProbe, HttpProbe, ProbeConfig};
pub use refresher::PoolRefresher;
pub use state::{ProxyPool, ProxySelector};
