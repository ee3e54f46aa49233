//! Gateway server implementation using hyper
//!
//! Accepts client connections (optionally over TLS), authenticates each
//! request and hands it to the forwarding gateway. Every path is handled the
//! same way.

use std::convert::Infallible;
use std::sync::Arc;

use bytes::Bytes;
use hyper::body::{Body, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, instrument};

use crate::config::GatewayConfig;
use crate::error::Result;
use crate::gateway::auth::{BasicAuth, CredentialCheck};
use crate::gateway::forward::{full_body, ForwardConfig, ForwardGateway, GatewayBody};
use crate::gateway::tls;
use crate::pool::ProxySelector;
use crate::shutdown::wait_for_shutdown;

/// Authenticates a request, then forwards it
pub struct Gateway {
    auth: BasicAuth,
    forwarder: ForwardGateway,
}

impl Gateway {
    pub fn new(auth: BasicAuth, forwarder: ForwardGateway) -> Self {
        Self { auth, forwarder }
    }

    /// Handle one client request end to end
    pub async fn handle<B>(&self, req: Request<B>) -> Response<GatewayBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        // Rejected requests never reach the pool.
        if let Err(e) = self.auth.validate(&req) {
            debug!("Rejecting {} {}: {}", req.method(), req.uri(), e);
            return self.auth.challenge_response::<Bytes>().map(full_body);
        }

        self.forwarder.forward(req).await
    }
}

/// Gateway server
pub struct GatewayServer {
    config: GatewayConfig,
    gateway: Arc<Gateway>,
    tls: Option<TlsAcceptor>,
}

impl GatewayServer {
    /// Create a new gateway server
    ///
    /// Fails if TLS is configured and the certificate or key cannot be loaded.
    pub fn new(
        config: GatewayConfig,
        selector: Arc<dyn ProxySelector>,
        credentials: Arc<dyn CredentialCheck>,
    ) -> Result<Self> {
        let tls = config.tls.as_ref().map(tls::load_acceptor).transpose()?;

        let forwarder = ForwardGateway::new(
            selector,
            ForwardConfig {
                timeout: config.forward_timeout,
            },
        );
        let gateway = Arc::new(Gateway::new(BasicAuth::new(credentials), forwarder));

        Ok(Self {
            config,
            gateway,
            tls,
        })
    }

    /// Bind the configured listen address
    ///
    /// Called before serving so an unusable address fails startup.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        Ok(listener)
    }

    /// Accept connections on `listener` until shutdown
    #[instrument(skip(self, listener, shutdown))]
    pub async fn serve(
        &self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!(
            "Gateway listening on {}://{}",
            if self.tls.is_some() { "https" } else { "http" },
            local_addr
        );

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, client_addr)) => {
                            let gateway = self.gateway.clone();
                            let tls = self.tls.clone();

                            tokio::spawn(async move {
                                let result = match tls {
                                    Some(acceptor) => match acceptor.accept(stream).await {
                                        Ok(tls_stream) => {
                                            Self::handle_connection(tls_stream, gateway).await
                                        }
                                        Err(e) => {
                                            debug!("TLS handshake failed from {}: {}", client_addr, e);
                                            return;
                                        }
                                    },
                                    None => Self::handle_connection(stream, gateway).await,
                                };

                                if let Err(e) = result {
                                    debug!("Connection error from {}: {}", client_addr, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = wait_for_shutdown(&mut shutdown) => {
                    info!("Gateway server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Serve HTTP/1.1 on a single connection
    async fn handle_connection<S>(io: S, gateway: Arc<Gateway>) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let service = service_fn(move |req: Request<Incoming>| {
            let gateway = gateway.clone();
            async move { Ok::<_, Infallible>(gateway.handle(req).await) }
        });

        http1::Builder::new()
            .serve_connection(TokioIo::new(io), service)
            .await?;

        Ok(())
    }
}
