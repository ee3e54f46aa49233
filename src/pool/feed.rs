//! Candidate feeds
//!
//! A feed supplies the raw candidate addresses for one refresh cycle.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{GatewayError, Result};

/// Source of candidate proxy addresses
#[async_trait]
pub trait CandidateFeed: Send + Sync {
    /// Fetch the candidates for the next refresh cycle
    async fn fetch(&self) -> Result<Vec<String>>;
}

/// Fixed candidate list, typically from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticFeed {
    candidates: Vec<String>,
}

impl StaticFeed {
    pub fn new(candidates: Vec<String>) -> Self {
        Self { candidates }
    }
}

#[async_trait]
impl CandidateFeed for StaticFeed {
    async fn fetch(&self) -> Result<Vec<String>> {
        Ok(self.candidates.clone())
    }
}

/// Newline-separated candidate file, re-read on every fetch
///
/// Blank lines and lines starting with `#` are ignored.
#[derive(Debug, Clone)]
pub struct FileFeed {
    path: PathBuf,
}

impl FileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CandidateFeed for FileFeed {
    async fn fetch(&self) -> Result<Vec<String>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            GatewayError::Feed(format!("failed to read {}: {}", self.path.display(), e))
        })?;

        let candidates = parse_candidates(&contents);
        debug!(
            "Read {} candidates from {}",
            candidates.len(),
            self.path.display()
        );
        Ok(candidates)
    }
}

fn parse_candidates(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}
