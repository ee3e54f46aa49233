//! Local stand-ins for upstream proxies used by the unit tests
//!
//! A mock upstream is a plain hyper server on `127.0.0.1:0`. When the HTTP
//! client is pointed at it as a proxy, it receives absolute-form requests, so
//! the recorded URI shows the target that was routed through it.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::header::HeaderMap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;

/// A request as observed by a mock upstream
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct MockUpstream {
    addr: SocketAddr,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
    task: JoinHandle<()>,
}

impl MockUpstream {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Proxy URL for this upstream
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().clone()
    }

    pub fn hits(&self) -> usize {
        self.seen.lock().len()
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub fn text_response(status: StatusCode, body: &str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response
}

/// An address nothing is listening on
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

pub async fn spawn_upstream<F>(respond: F) -> MockUpstream
where
    F: Fn(&SeenRequest) -> Response<Full<Bytes>> + Send + Sync + 'static,
{
    spawn_upstream_with_delay(Duration::ZERO, respond).await
}

/// Like [`spawn_upstream`], but waits `delay` before answering each request
pub async fn spawn_upstream_with_delay<F>(delay: Duration, respond: F) -> MockUpstream
where
    F: Fn(&SeenRequest) -> Response<Full<Bytes>> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let respond = Arc::new(respond);

    let task_seen = seen.clone();
    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = task_seen.clone();
            let respond = respond.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let seen = seen.clone();
                    let respond = respond.clone();

                    async move {
                        let (parts, body) = req.into_parts();
                        let body = body
                            .collect()
                            .await
                            .map(|collected| collected.to_bytes())
                            .unwrap_or_default();

                        let request = SeenRequest {
                            method: parts.method.to_string(),
                            uri: parts.uri.to_string(),
                            headers: parts.headers,
                            body,
                        };
                        let response = respond(&request);
                        seen.lock().push(request);

                        if !delay.is_zero() {
                            tokio::time::sleep(delay).await;
                        }
                        Ok::<_, Infallible>(response)
                    }
                });

                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    MockUpstream { addr, seen, task }
}

/// An upstream that answers 200 with `first`, holds the body open for
/// `pause`, then sends `rest`
pub async fn spawn_trickling_upstream(
    first: &'static str,
    pause: Duration,
    rest: &'static str,
) -> MockUpstream {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));

    let task_seen = seen.clone();
    let task = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let seen = task_seen.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let seen = seen.clone();

                    async move {
                        let (parts, _) = req.into_parts();
                        seen.lock().push(SeenRequest {
                            method: parts.method.to_string(),
                            uri: parts.uri.to_string(),
                            headers: parts.headers,
                            body: Bytes::new(),
                        });

                        let (tx, rx) = mpsc::channel::<Result<Frame<Bytes>, Infallible>>(2);
                        tokio::spawn(async move {
                            if tx.send(Ok(Frame::data(Bytes::from(first)))).await.is_err() {
                                return;
                            }
                            tokio::time::sleep(pause).await;
                            let _ = tx.send(Ok(Frame::data(Bytes::from(rest)))).await;
                        });

                        Ok::<_, Infallible>(Response::new(StreamBody::new(ReceiverStream::new(rx))))
                    }
                });

                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    MockUpstream { addr, seen, task }
}

/// Paths of the long-lived `localhost` certificate and key under `tests/fixtures`
pub fn localhost_tls_files() -> (PathBuf, PathBuf) {
    let fixtures = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures");
    (fixtures.join("localhost.crt"), fixtures.join("localhost.key"))
}
