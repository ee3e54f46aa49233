//! TLS material loading for the gateway listener

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use tokio_rustls::rustls::crypto::ring;
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;
use tracing::debug;

use crate::config::TlsConfig;
use crate::error::{GatewayError, Result};

/// Build a TLS acceptor from PEM certificate chain and private key files
pub fn load_acceptor(config: &TlsConfig) -> Result<TlsAcceptor> {
    debug!("Loading TLS certificate from: {}", config.cert_path.display());
    debug!("Loading TLS private key from: {}", config.key_path.display());

    let mut cert_file = open(&config.cert_path, "certificate")?;
    let mut key_file = open(&config.key_path, "private key")?;

    let certs = rustls_pemfile::certs(&mut cert_file)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| GatewayError::Tls(format!("Failed to read certificate: {}", e)))?;

    if certs.is_empty() {
        return Err(GatewayError::Tls("No valid certificate found".to_string()));
    }

    let private_key = rustls_pemfile::private_key(&mut key_file)
        .map_err(|e| GatewayError::Tls(format!("Failed to read private key: {}", e)))?
        .ok_or_else(|| GatewayError::Tls("No valid private key found".to_string()))?;

    let server_config = ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .map_err(|e| GatewayError::Tls(format!("Unsupported protocol versions: {}", e)))?
        .with_no_client_auth()
        .with_single_cert(certs, private_key)
        .map_err(|e| GatewayError::Tls(format!("Failed to create TLS config: {}", e)))?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn open(path: &Path, what: &str) -> Result<BufReader<File>> {
    File::open(path).map(BufReader::new).map_err(|e| {
        GatewayError::Tls(format!(
            "Failed to open {} file {}: {}",
            what,
            path.display(),
            e
        ))
    })
}
