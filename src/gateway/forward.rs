//! Request forwarding through the selected upstream proxy
//!
//! Each request either relays the upstream's status, headers and streamed
//! body, or ends with 502 Bad Gateway. There is no retry and no fallback to a
//! second upstream.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::TryStreamExt;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyDataStream, BodyExt, Full, StreamBody};
use hyper::body::{Body, Frame};
use hyper::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE, HOST};
use hyper::{Request, Response, StatusCode, Uri};
use reqwest::redirect::Policy;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, error, info, instrument, warn};
use url::Url;

use crate::error::{GatewayError, Result};
use crate::models::ProxyAddress;
use crate::pool::ProxySelector;

/// Response body produced by the gateway
pub type GatewayBody = UnsyncBoxBody<Bytes, GatewayError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Chunks of request body buffered between the client and the upstream
const REQUEST_BODY_BUFFER: usize = 8;

/// Configuration for the forwarding gateway
#[derive(Debug, Clone)]
pub struct ForwardConfig {
    /// Total timeout for the upstream exchange, body included
    pub timeout: Duration,
}

impl Default for ForwardConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
        }
    }
}

/// Relays client requests through the proxy chosen by a [`ProxySelector`]
pub struct ForwardGateway {
    selector: Arc<dyn ProxySelector>,
    config: ForwardConfig,
}

impl ForwardGateway {
    pub fn new(selector: Arc<dyn ProxySelector>, config: ForwardConfig) -> Self {
        Self { selector, config }
    }

    /// Forward one request and produce the client response
    #[instrument(skip(self, req), fields(method = %req.method(), uri = %req.uri()))]
    pub async fn forward<B>(&self, req: Request<B>) -> Response<GatewayBody>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let proxy = match self.selector.select() {
            Ok(proxy) => proxy,
            Err(e) => {
                error!("No proxy available: {}", e);
                return error_response(e.status_code(), "Failed to select proxy");
            }
        };

        let start = Instant::now();
        match self.forward_through(&proxy, req).await {
            Ok(response) => {
                info!(
                    "Relayed through {} with status {} in {}ms",
                    proxy,
                    response.status().as_u16(),
                    start.elapsed().as_millis()
                );
                response
            }
            Err(e) => {
                warn!(
                    "Request through {} failed after {}ms: {}",
                    proxy,
                    start.elapsed().as_millis(),
                    e
                );
                error_response(e.status_code(), "Failed to forward request")
            }
        }
    }

    async fn forward_through<B>(
        &self,
        proxy: &ProxyAddress,
        req: Request<B>,
    ) -> Result<Response<GatewayBody>>
    where
        B: Body<Data = Bytes> + Send + 'static,
        B::Error: Into<BoxError>,
    {
        let target = rewrite_target(req.uri(), proxy)?;
        debug!("Forwarding to {} through {}", target, proxy);

        let upstream = reqwest::Proxy::all(proxy.url())
            .map_err(|e| GatewayError::UpstreamForwardFailed(e.to_string()))?;

        let client = reqwest::Client::builder()
            .proxy(upstream)
            .timeout(self.config.timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| GatewayError::UpstreamForwardFailed(e.to_string()))?;

        let (parts, body) = req.into_parts();
        let mut outbound = client
            .request(parts.method, target)
            .headers(copy_headers(&parts.headers, is_consumed_request_header));

        if body.size_hint().exact() != Some(0) {
            outbound = outbound.body(stream_request_body(body));
        }

        let response = outbound.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::UpstreamForwardFailed(format!(
                    "timed out after {}s",
                    self.config.timeout.as_secs_f32()
                ))
            } else {
                GatewayError::UpstreamForwardFailed(e.to_string())
            }
        })?;

        Ok(relay_response(response))
    }
}

/// Target URL for the outbound request
///
/// Absolute-form requests keep their target. Origin-form requests are pointed
/// at the upstream itself, keeping the path and query.
fn rewrite_target(uri: &Uri, proxy: &ProxyAddress) -> Result<Url> {
    let target = match (uri.scheme(), uri.authority()) {
        (Some(_), Some(_)) => uri.to_string(),
        _ => format!(
            "{}://{}{}",
            proxy.scheme(),
            proxy.authority(),
            uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
        ),
    };

    Url::parse(&target).map_err(|e| {
        GatewayError::UpstreamForwardFailed(format!("invalid target {}: {}", target, e))
    })
}

/// Pipe the client body to the upstream as it arrives
fn stream_request_body<B>(body: B) -> reqwest::Body
where
    B: Body<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (tx, rx) = mpsc::channel::<std::result::Result<Bytes, BoxError>>(REQUEST_BODY_BUFFER);

    tokio::spawn(async move {
        let chunks = BodyDataStream::new(body).map_err(|e| -> BoxError { e.into() });
        tokio::pin!(chunks);

        while let Some(chunk) = chunks.next().await {
            let failed = chunk.is_err();
            // Upstream went away or the client body broke; either way we are done.
            if tx.send(chunk).await.is_err() || failed {
                break;
            }
        }
    });

    reqwest::Body::wrap_stream(ReceiverStream::new(rx))
}

/// Turn the upstream response into the client response without buffering the body
fn relay_response(upstream: reqwest::Response) -> Response<GatewayBody> {
    let status = upstream.status();
    let headers = copy_headers(upstream.headers(), is_hop_by_hop_header);

    let frames = upstream
        .bytes_stream()
        .map_ok(Frame::data)
        .map_err(|e| GatewayError::UpstreamForwardFailed(e.to_string()));

    let mut response = Response::new(StreamBody::new(frames).boxed_unsync());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Copy every value of every header not rejected by `skip`, keeping per-key order
fn copy_headers(source: &HeaderMap, skip: impl Fn(&HeaderName) -> bool) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if !skip(name) {
            headers.append(name.clone(), value.clone());
        }
    }
    headers
}

/// Headers of the inbound request that are not passed upstream
fn is_consumed_request_header(name: &HeaderName) -> bool {
    // Host follows the rewritten target; Authorization belongs to the gateway.
    is_hop_by_hop_header(name) || name == HOST || name == AUTHORIZATION
}

/// Check if a header is a hop-by-hop header that should not be forwarded
fn is_hop_by_hop_header(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
    )
}

/// Box a complete in-memory body
pub fn full_body(body: impl Into<Bytes>) -> GatewayBody {
    Full::new(body.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Create a plain-text error response
pub fn error_response(status: StatusCode, message: &str) -> Response<GatewayBody> {
    let mut response = Response::new(full_body(format!("{}\n", message)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
