use std::collections::HashMap;
use std::convert::Infallible;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

/// In-process upstream on an ephemeral port. Routes:
///
/// - `/foo`      200 "hello", text/plain
/// - `/slow`     200 "slow" after 300ms
/// - `/gzip`     200, gzip-encoded "compressed hello"
/// - `/counter`  200, body is the number of calls to this path so far
/// - `/missing`  404 "not here"
/// - `/echo`     200, describes the received request
/// - `/sized`    200 "hello" with an explicit `content-length: 5`, also on HEAD
/// - `/bad-gzip` 200, claims gzip but the body is not
#[derive(Clone)]
pub struct MockUpstream {
    addr: SocketAddr,
    calls: Arc<Mutex<HashMap<String, usize>>>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let calls = Arc::new(Mutex::new(HashMap::new()));

        let mock = Self { addr, calls };
        let server = mock.clone();
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let server = server.clone();
                tokio::spawn(async move {
                    let service = service_fn(move |req| {
                        let server = server.clone();
                        async move { Ok::<_, Infallible>(server.respond(req).await) }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        mock
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn calls(&self, path: &str) -> usize {
        self.calls.lock().unwrap().get(path).copied().unwrap_or(0)
    }

    async fn respond(&self, req: Request<Incoming>) -> Response<Full<Bytes>> {
        let path = req.uri().path().to_string();
        let count = {
            let mut calls = self.calls.lock().unwrap();
            let n = calls.entry(path.clone()).or_insert(0);
            *n += 1;
            *n
        };

        match path.as_str() {
            "/foo" => text(StatusCode::OK, "hello"),
            "/slow" => {
                tokio::time::sleep(Duration::from_millis(300)).await;
                text(StatusCode::OK, "slow")
            }
            "/gzip" => {
                let mut enc = GzEncoder::new(Vec::new(), Compression::default());
                enc.write_all(b"compressed hello").unwrap();
                Response::builder()
                    .header("content-type", "text/plain")
                    .header("content-encoding", "gzip")
                    .body(Full::new(Bytes::from(enc.finish().unwrap())))
                    .unwrap()
            }
            "/counter" => text(StatusCode::OK, count.to_string()),
            "/sized" => {
                let body = if req.method() == Method::HEAD {
                    Bytes::new()
                } else {
                    Bytes::from_static(b"hello")
                };
                Response::builder()
                    .header("content-type", "text/plain")
                    .header("content-length", "5")
                    .body(Full::new(body))
                    .unwrap()
            }
            "/bad-gzip" => Response::builder()
                .header("content-encoding", "gzip")
                .body(Full::new(Bytes::from_static(b"definitely not gzip")))
                .unwrap(),
            "/echo" => {
                let header = |name: &str| {
                    req.headers()
                        .get(name)
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("-")
                        .to_string()
                };
                let summary = format!(
                    "{} {} ae={} x={} host={}",
                    req.method(),
                    req.uri(),
                    header("accept-encoding"),
                    header("x-test"),
                    header("host"),
                );
                let body = req.into_body().collect().await.unwrap().to_bytes();
                text(
                    StatusCode::OK,
                    format!("{summary} body={}", String::from_utf8_lossy(&body)),
                )
            }
            _ => text(StatusCode::NOT_FOUND, "not here"),
        }
    }
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("content-type", "text/plain")
        .body(Full::new(body.into()))
        .unwrap()
}

/// Accepts connections, counts them, and hangs up after `delay` without
/// answering.
pub async fn start_hangup_upstream(delay: Duration) -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));

    let counter = accepted.clone();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                drop(stream);
            });
        }
    });

    (format!("http://{addr}"), accepted)
}

/// Accepts connections and holds them open without ever answering.
pub async fn start_silent_upstream() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((stream, _)) = listener.accept().await {
            held.push(stream);
        }
    });

    format!("http://{addr}")
}

/// A URL on which nothing listens.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
