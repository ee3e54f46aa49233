//! Client-facing gateway
//!
//! This module provides the request path:
//! - Basic authentication of every client request
//! - Forwarding through the selected upstream proxy
//! - The hyper listener, optionally terminating TLS

pub mod auth;
pub mod forward;
pub mod server;
pub mod tls;

pub use auth::{BasicAuth, CredentialCheck, StaticCredentials};
pub use forward::{ForwardConfig, ForwardGateway, GatewayBody};
pub use server::{Gateway, GatewayServer};
