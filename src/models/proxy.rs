use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::error::GatewayError;

/// Scheme an upstream proxy is spoken to with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyScheme {
    Http,
    Https,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "http" => Some(ProxyScheme::Http),
            "https" => Some(ProxyScheme::Https),
            _ => None,
        }
    }
}

impl fmt::Display for ProxyScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A validated upstream proxy endpoint
///
/// Built only through [`ProxyAddress::parse`], so every value in the pool has a
/// supported scheme, a host and a port. Credentials embedded in the candidate
/// URL are kept for the proxy handshake but never displayed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProxyAddress {
    scheme: ProxyScheme,
    host: String,
    port: u16,
    username: Option<String>,
    password: Option<String>,
}

impl ProxyAddress {
    /// Parse a raw candidate string such as `http://proxy.example:8080`
    pub fn parse(raw: &str) -> Result<Self, GatewayError> {
        let raw = raw.trim();
        let url = Url::parse(raw)?;

        let scheme = ProxyScheme::from_str(url.scheme()).ok_or_else(|| {
            GatewayError::InvalidCandidateAddress(format!(
                "unsupported scheme {} in {}",
                url.scheme(),
                raw
            ))
        })?;

        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| GatewayError::InvalidCandidateAddress(format!("missing host in {}", raw)))?;

        if url.query().is_some() || url.fragment().is_some() {
            return Err(GatewayError::InvalidCandidateAddress(format!(
                "query or fragment not allowed in {}",
                raw
            )));
        }
        if !(url.path().is_empty() || url.path() == "/") {
            return Err(GatewayError::InvalidCandidateAddress(format!(
                "path not allowed in {}",
                raw
            )));
        }

        let port = url.port_or_known_default().ok_or_else(|| {
            GatewayError::InvalidCandidateAddress(format!("missing port in {}", raw))
        })?;

        let username = if url.username().is_empty() {
            None
        } else {
            Some(url.username().to_string())
        };

        Ok(Self {
            scheme,
            host: host.to_string(),
            port,
            username,
            password: url.password().map(|p| p.to_string()),
        })
    }

    pub fn scheme(&self) -> ProxyScheme {
        self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port`, the authority used when a request target is rewritten onto this proxy
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Full proxy URL including credentials, for handing to the HTTP client
    pub fn url(&self) -> String {
        match (&self.username, &self.password) {
            (Some(user), Some(pass)) => {
                format!("{}://{}:{}@{}", self.scheme, user, pass, self.authority())
            }
            (Some(user), None) => format!("{}://{}@{}", self.scheme, user, self.authority()),
            _ => format!("{}://{}", self.scheme, self.authority()),
        }
    }
}

impl FromStr for ProxyAddress {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProxyAddress::parse(s)
    }
}

impl fmt::Display for ProxyAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())
    }
}
