use crate::error::{GatewayError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Gateway listener configuration
    pub gateway: GatewayConfig,
    /// Proxy pool configuration
    pub pool: PoolConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Host to bind to (default: 0.0.0.0)
    pub host: String,
    /// Port for the gateway (default: 8888)
    pub port: u16,
    /// TLS certificate and key; plain HTTP when absent
    pub tls: Option<TlsConfig>,
    /// Basic authentication username
    pub auth_username: String,
    /// Basic authentication password
    pub auth_password: String,
    /// Total timeout for a forwarded request
    pub forward_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    /// PEM certificate chain
    pub cert_path: PathBuf,
    /// PEM private key
    pub key_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Delay between refresh cycles
    pub refresh_interval: Duration,
    /// Total timeout for one health probe
    pub probe_timeout: Duration,
    /// URL fetched through each candidate during a probe
    pub probe_url: Url,
    /// Candidates supplied inline (comma-separated)
    pub candidates: Vec<String>,
    /// Newline-separated candidate file, re-read every cycle
    pub candidates_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level used when RUST_LOG is unset
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

pub const DEFAULT_PROBE_URL: &str = "http://www.example.com";

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            gateway: GatewayConfig {
                host: get_env_or("GATEWAY_HOST", "0.0.0.0"),
                port: get_env_or("GATEWAY_PORT", "8888").parse().map_err(|_| {
                    GatewayError::InvalidConfig("GATEWAY_PORT must be a valid port number".into())
                })?,
                tls: parse_tls()?,
                auth_username: get_env_or("GATEWAY_AUTH_USERNAME", "user"),
                auth_password: get_env_or("GATEWAY_AUTH_PASSWORD", "pass"),
                forward_timeout: parse_secs("GATEWAY_FORWARD_TIMEOUT", "10")?,
            },
            pool: PoolConfig {
                refresh_interval: parse_secs("POOL_REFRESH_INTERVAL", "600")?,
                probe_timeout: parse_secs("POOL_PROBE_TIMEOUT", "5")?,
                probe_url: Url::parse(&get_env_or("POOL_PROBE_URL", DEFAULT_PROBE_URL))
                    .map_err(|e| {
                        GatewayError::InvalidConfig(format!(
                            "POOL_PROBE_URL must be a valid URL: {}",
                            e
                        ))
                    })?,
                candidates: get_env_or("POOL_CANDIDATES", "")
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                candidates_file: env::var("POOL_CANDIDATES_FILE")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Get the gateway listen address
    pub fn gateway_addr(&self) -> String {
        format!("{}:{}", self.gateway.host, self.gateway.port)
    }
}

fn parse_tls() -> Result<Option<TlsConfig>> {
    let cert = env::var("GATEWAY_TLS_CERT").unwrap_or_default();
    let key = env::var("GATEWAY_TLS_KEY").unwrap_or_default();

    match (cert.trim(), key.trim()) {
        ("", "") => Ok(None),
        (cert, key) if !cert.is_empty() && !key.is_empty() => Ok(Some(TlsConfig {
            cert_path: PathBuf::from(cert),
            key_path: PathBuf::from(key),
        })),
        _ => Err(GatewayError::InvalidConfig(
            "GATEWAY_TLS_CERT and GATEWAY_TLS_KEY must be set together".into(),
        )),
    }
}

/// Parse a positive number of seconds
fn parse_secs(key: &str, default: &str) -> Result<Duration> {
    match get_env_or(key, default).parse::<u64>() {
        Ok(secs) if secs > 0 => Ok(Duration::from_secs(secs)),
        _ => Err(GatewayError::InvalidConfig(format!(
            "{} must be a positive number of seconds",
            key
        ))),
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
