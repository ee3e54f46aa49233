use hyper::StatusCode;
use thiserror::Error;

/// Unified error type for the gateway
#[derive(Error, Debug)]
pub enum GatewayError {
    // Pool errors
    #[error("Invalid candidate address: {0}")]
    InvalidCandidateAddress(String),

    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("No proxy available")]
    NoProxyAvailable,

    #[error("Candidate feed error: {0}")]
    Feed(String),

    // Forwarding errors
    #[error("Upstream forward failed: {0}")]
    UpstreamForwardFailed(String),

    // Authentication errors
    #[error("Unauthorized")]
    Unauthorized,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("TLS error: {0}")]
    Tls(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // HTTP errors
    #[error("HTTP error: {0}")]
    Http(String),
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

impl GatewayError {
    /// Get the HTTP status code returned to a client for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 401 Unauthorized
            GatewayError::Unauthorized => StatusCode::UNAUTHORIZED,

            // 502 Bad Gateway
            GatewayError::NoProxyAvailable | GatewayError::UpstreamForwardFailed(_) => {
                StatusCode::BAD_GATEWAY
            }

            // Never surfaced to clients in practice; the pool recovers these locally.
            GatewayError::InvalidCandidateAddress(_)
            | GatewayError::ProbeFailed(_)
            | GatewayError::Feed(_)
            | GatewayError::InvalidConfig(_)
            | GatewayError::Tls(_)
            | GatewayError::Io(_)
            | GatewayError::Http(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Convert from hyper errors
impl From<hyper::Error> for GatewayError {
    fn from(err: hyper::Error) -> Self {
        GatewayError::Http(err.to_string())
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for GatewayError {
    fn from(err: url::ParseError) -> Self {
        GatewayError::InvalidCandidateAddress(err.to_string())
    }
}
