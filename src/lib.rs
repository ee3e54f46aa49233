//! Proxygate - Authenticated Forwarding Gateway
//!
//! Accepts HTTP requests from clients, checks their credentials and relays
//! them through one of a pool of upstream proxies.
//!
//! ## Features
//!
//! - Upstream pool refreshed periodically from a candidate feed
//! - Health probing of every candidate through itself
//! - Basic authentication with a pluggable credential check
//! - Streaming request and response bodies
//! - Optional TLS on the client-facing listener

pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod pool;
pub mod shutdown;

#[cfg(test)]
pub mod test_utils;

pub use config::Config;
pub use error::{GatewayError, Result};
