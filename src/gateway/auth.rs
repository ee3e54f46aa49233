//! Gateway authentication
//!
//! Handles HTTP Basic authentication for inbound requests. The credential
//! decision itself is delegated to a [`CredentialCheck`].

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hyper::header::{HeaderValue, AUTHORIZATION, WWW_AUTHENTICATE};
use hyper::{Request, Response, StatusCode};
use tracing::{debug, warn};

use crate::error::{GatewayError, Result};

/// Decides whether a username/password pair is allowed through
pub trait CredentialCheck: Send + Sync {
    fn check(&self, username: &str, password: &str) -> bool;
}

/// A single fixed username/password pair
#[derive(Clone)]
pub struct StaticCredentials {
    username: String,
    password: String,
}

impl StaticCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialCheck for StaticCredentials {
    fn check(&self, username: &str, password: &str) -> bool {
        username == self.username && password == self.password
    }
}

impl<F> CredentialCheck for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn check(&self, username: &str, password: &str) -> bool {
        self(username, password)
    }
}

/// Basic authentication handler
#[derive(Clone)]
pub struct BasicAuth {
    credentials: Arc<dyn CredentialCheck>,
}

impl BasicAuth {
    pub fn new(credentials: Arc<dyn CredentialCheck>) -> Self {
        Self { credentials }
    }

    /// Validate the Authorization header
    pub fn validate<T>(&self, req: &Request<T>) -> Result<()> {
        let auth_header = req
            .headers()
            .get(AUTHORIZATION)
            .ok_or(GatewayError::Unauthorized)?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| GatewayError::Unauthorized)?;

        // Parse "Basic <base64>"
        let encoded = match auth_str.split_once(' ') {
            Some((scheme, encoded)) if scheme.eq_ignore_ascii_case("basic") => encoded.trim(),
            _ => {
                warn!("Invalid auth scheme, expected Basic");
                return Err(GatewayError::Unauthorized);
            }
        };

        let decoded = BASE64
            .decode(encoded)
            .map_err(|_| GatewayError::Unauthorized)?;

        let credentials = String::from_utf8(decoded).map_err(|_| GatewayError::Unauthorized)?;

        let (user, pass) = credentials
            .split_once(':')
            .ok_or(GatewayError::Unauthorized)?;

        if self.credentials.check(user, pass) {
            debug!("Authentication successful for user: {}", user);
            Ok(())
        } else {
            warn!("Authentication failed for user: {}", user);
            Err(GatewayError::Unauthorized)
        }
    }

    /// Create a 401 Unauthorized response carrying the Basic challenge
    pub fn challenge_response<T>(&self) -> Response<T>
    where
        T: From<&'static str>,
    {
        let mut response = Response::new(T::from("Unauthorized\n"));
        *response.status_mut() = StatusCode::UNAUTHORIZED;
        response.headers_mut().insert(
            WWW_AUTHENTICATE,
            HeaderValue::from_static("Basic realm=\"Restricted\""),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use http_body_util::Full;

    fn create_request_with_auth(auth: Option<&str>) -> Request<Full<Bytes>> {
        let mut builder = Request::builder().uri("/anything");

        if let Some(auth_value) = auth {
            builder = builder.header(AUTHORIZATION, auth_value);
        }

        builder.body(Full::new(Bytes::new())).unwrap()
    }

    fn basic(credentials: &str) -> String {
        format!("Basic {}", BASE64.encode(credentials))
    }

    fn static_auth() -> BasicAuth {
        BasicAuth::new(Arc::new(StaticCredentials::new("user", "pass")))
    }

    #[test]
    fn test_auth_missing_header() {
        let req = create_request_with_auth(None);
        assert!(matches!(
            static_auth().validate(&req),
            Err(GatewayError::Unauthorized)
        ));
    }

    #[test]
    fn test_auth_valid_credentials() {
        let req = create_request_with_auth(Some(&basic("user:pass")));
        assert!(static_auth().validate(&req).is_ok());
    }

    #[test]
    fn test_auth_scheme_is_case_insensitive() {
        let value = format!("basic {}", BASE64.encode("user:pass"));
        let req = create_request_with_auth(Some(&value));
        assert!(static_auth().validate(&req).is_ok());
    }

    #[test]
    fn test_auth_password_may_contain_colon() {
        let auth = BasicAuth::new(Arc::new(StaticCredentials::new("user", "p:a:ss")));
        let req = create_request_with_auth(Some(&basic("user:p:a:ss")));
        assert!(auth.validate(&req).is_ok());
    }

    #[test]
    fn test_auth_invalid_credentials() {
        for credentials in ["wrong:wrong", "user:wrong", "user", ""] {
            let req = create_request_with_auth(Some(&basic(credentials)));
            assert!(
                matches!(static_auth().validate(&req), Err(GatewayError::Unauthorized)),
                "{credentials:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_auth_invalid_scheme_or_encoding() {
        for value in ["Bearer token123", "Basic", "Basic !!!not-base64!!!"] {
            let req = create_request_with_auth(Some(value));
            assert!(matches!(
                static_auth().validate(&req),
                Err(GatewayError::Unauthorized)
            ));
        }
    }

    #[test]
    fn test_pluggable_credential_check() {
        let auth = BasicAuth::new(Arc::new(|user: &str, _pass: &str| user.starts_with("team-")));
        let allowed = create_request_with_auth(Some(&basic("team-a:anything")));
        let denied = create_request_with_auth(Some(&basic("other:anything")));

        assert!(auth.validate(&allowed).is_ok());
        assert!(auth.validate(&denied).is_err());
    }

    #[test]
    fn test_challenge_response() {
        let response: Response<Full<Bytes>> = static_auth().challenge_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get(WWW_AUTHENTICATE).unwrap(),
            "Basic realm=\"Restricted\""
        );
    }
}
