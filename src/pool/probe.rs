//! Health probing for candidate proxies
//!
//! A candidate is healthy when a GET for the probe URL, sent through it as an
//! HTTP proxy, comes back with 200 within the probe timeout.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::redirect::Policy;
use reqwest::StatusCode;
use tracing::{debug, instrument};
use url::Url;

use crate::config::DEFAULT_PROBE_URL;
use crate::error::{GatewayError, Result};
use crate::models::ProxyAddress;

/// Live connectivity test for one proxy
#[async_trait]
pub trait HealthProbe: Send + Sync {
    /// Returns `Ok(())` if the proxy is usable, `ProbeFailed` otherwise
    async fn probe(&self, proxy: &ProxyAddress) -> Result<()>;
}

/// Probe configuration
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// URL fetched through the candidate
    pub probe_url: Url,
    /// Total timeout for the probe request
    pub timeout: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            probe_url: Url::parse(DEFAULT_PROBE_URL).expect("default probe URL is valid"),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Probes a candidate with a real HTTP request routed through it
#[derive(Debug, Clone, Default)]
pub struct HttpProbe {
    config: ProbeConfig,
}

impl HttpProbe {
    pub fn new(config: ProbeConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl HealthProbe for HttpProbe {
    #[instrument(skip(self), fields(proxy = %proxy))]
    async fn probe(&self, proxy: &ProxyAddress) -> Result<()> {
        let upstream = reqwest::Proxy::all(proxy.url())
            .map_err(|e| GatewayError::InvalidCandidateAddress(e.to_string()))?;

        let client = reqwest::Client::builder()
            .proxy(upstream)
            .timeout(self.config.timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| GatewayError::ProbeFailed(format!("client setup failed: {}", e)))?;

        let response = client
            .get(self.config.probe_url.clone())
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::ProbeFailed(format!(
                        "timed out after {}s",
                        self.config.timeout.as_secs_f32()
                    ))
                } else {
                    GatewayError::ProbeFailed(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::OK => {
                debug!("Proxy {} passed probe", proxy);
                Ok(())
            }
            status => Err(GatewayError::ProbeFailed(format!(
                "unexpected status {}",
                status
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{spawn_upstream, spawn_upstream_with_delay, text_response, unused_addr};

    fn probe_with_timeout(timeout: Duration) -> HttpProbe {
        HttpProbe::new(ProbeConfig {
            probe_url: Url::parse("http://probe.test/health").unwrap(),
            timeout,
        })
    }

    #[tokio::test]
    async fn test_probe_success_goes_through_proxy() {
        let upstream = spawn_upstream(|_| text_response(StatusCode::OK, "ok")).await;
        let proxy = ProxyAddress::parse(&upstream.url()).unwrap();

        probe_with_timeout(Duration::from_secs(5))
            .probe(&proxy)
            .await
            .unwrap();

        let seen = upstream.requests();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "GET");
        assert_eq!(seen[0].uri, "http://probe.test/health");
    }

    #[tokio::test]
    async fn test_probe_non_200_fails() {
        let upstream = spawn_upstream(|_| text_response(StatusCode::NO_CONTENT, "")).await;
        let proxy = ProxyAddress::parse(&upstream.url()).unwrap();

        let result = probe_with_timeout(Duration::from_secs(5)).probe(&proxy).await;
        assert!(matches!(result, Err(GatewayError::ProbeFailed(_))));
    }

    #[tokio::test]
    async fn test_probe_connection_refused_fails() {
        let proxy = ProxyAddress::parse(&format!("http://{}", unused_addr())).unwrap();

        let result = probe_with_timeout(Duration::from_secs(5)).probe(&proxy).await;
        assert!(matches!(result, Err(GatewayError::ProbeFailed(_))));
    }

    #[tokio::test]
    async fn test_probe_timeout_fails() {
        let upstream = spawn_upstream_with_delay(Duration::from_secs(2), |_| {
            text_response(StatusCode::OK, "late")
        })
        .await;
        let proxy = ProxyAddress::parse(&upstream.url()).unwrap();

        let result = probe_with_timeout(Duration::from_millis(200))
            .probe(&proxy)
            .await;
        assert!(matches!(result, Err(GatewayError::ProbeFailed(_))));
    }
}
