use std::fmt;

use bytes::Bytes;
use herd_cache::CacheEntry;
use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderValue, Response, StatusCode};
use http_body_util::Full;

/// Every response herd writes has a fully buffered body.
pub type HttpResponse = Response<Full<Bytes>>;

/// Diagnostic header telling the client where the body came from.
pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

/// How a cached entry reached this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    /// Served from the store without contacting the upstream.
    Hit,
    /// This request performed the upstream fetch.
    Miss,
    /// This request waited on another request's fetch.
    Coalesced,
}

impl CacheStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CacheStatus::Hit => "HIT",
            CacheStatus::Miss => "MISS",
            CacheStatus::Coalesced => "COALESCED",
        }
    }
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Replay a cache entry: its status, its headers (replacing anything set
/// before) and its decoded body, tagged with `X-Cache`.
pub fn cached_response(entry: &CacheEntry, cache_status: CacheStatus) -> HttpResponse {
    let mut resp = Response::new(Full::new(entry.body.clone()));
    *resp.status_mut() = entry.status;
    *resp.headers_mut() = entry.headers.clone();
    resp.headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(cache_status.as_str()));
    resp
}

/// Generic helper for a plain-text response.
pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> HttpResponse {
    let mut resp = Response::new(Full::new(body.into()));
    *resp.status_mut() = status;
    resp.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    resp
}

/// 502 carrying the failure description, so the client can tell a dead
/// upstream from a broken one.
pub fn send_502(message: &str) -> HttpResponse {
    text_response(StatusCode::BAD_GATEWAY, format!("{message}\n"))
}

pub fn send_400() -> HttpResponse {
    text_response(StatusCode::BAD_REQUEST, "400 Bad Request\n")
}

pub fn send_413() -> HttpResponse {
    text_response(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large\n")
}
