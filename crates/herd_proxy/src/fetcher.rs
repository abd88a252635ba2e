use std::time::Duration;

use bytes::Bytes;
use herd_cache::CacheEntry;
use herd_config::UpstreamConfig;
use http::header::CONTENT_LENGTH;
use http::{Request, request};
use http_body_util::{BodyExt, Full, Limited};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};
use tracing::{debug, info, instrument, warn};

use crate::decode::{gunzip, is_gzip};
use crate::error::FetchError;
use crate::headers::{cacheable_headers, outbound_headers};
use crate::path::upstream_url;

/// =======================================================
/// UPSTREAM FETCHER
/// =======================================================
///
/// Turns one inbound request into one upstream exchange and hands back a
/// ready-to-store [`CacheEntry`] (decoded body, cleaned headers, expiry).
///
/// Connections to the upstream are pooled by the hyper client, so the
/// fetcher is built once and shared behind an `Arc`.
pub struct UpstreamFetcher {
    client: Client<HttpConnector, Full<Bytes>>,
    base_url: String,
    fetch_timeout: Duration,
    max_body_bytes: usize,
    ttl: Duration,
}

impl UpstreamFetcher {
    pub fn new(cfg: &UpstreamConfig, ttl: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(cfg.connect_timeout()));
        connector.set_nodelay(true);

        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(cfg.pool_idle_timeout())
            .pool_timer(TokioTimer::new())
            .build(connector);

        Self {
            client,
            base_url: cfg.url().to_string(),
            fetch_timeout: cfg.fetch_timeout(),
            max_body_bytes: cfg.max_response_body_bytes(),
            ttl,
        }
    }

    /// Forward `parts` + `body` upstream and build the cache entry.
    ///
    /// The whole exchange (connect, headers, body) is bounded by the fetch
    /// timeout. Any upstream status is a success here; only transport,
    /// body and decode failures are errors.
    #[instrument(
        target = "herd::proxy",
        name = "upstream_fetch",
        skip(self, parts, body),
        fields(method = %parts.method, uri = %parts.uri)
    )]
    pub async fn fetch(
        &self,
        parts: &request::Parts,
        body: Bytes,
    ) -> Result<CacheEntry, FetchError> {
        let result = tokio::time::timeout(self.fetch_timeout, self.exchange(parts, body))
            .await
            .unwrap_or(Err(FetchError::Timeout(self.fetch_timeout)));

        match &result {
            Ok(entry) => info!(
                target: "herd::proxy",
                status = %entry.status,
                bytes = entry.body.len(),
                "Upstream fetch completed"
            ),
            Err(e) => warn!(
                target: "herd::proxy",
                error = %e.report(),
                "Upstream fetch failed"
            ),
        }

        result
    }

    async fn exchange(
        &self,
        parts: &request::Parts,
        body: Bytes,
    ) -> Result<CacheEntry, FetchError> {
        let target = upstream_url(&self.base_url, &parts.uri);
        debug!(target: "herd::proxy", %target, "Forwarding request upstream");

        let mut req = Request::builder()
            .method(parts.method.clone())
            .uri(target.as_str())
            .body(Full::new(body))
            .map_err(FetchError::Build)?;
        *req.headers_mut() = outbound_headers(&parts.headers);

        let resp = self
            .client
            .request(req)
            .await
            .map_err(FetchError::Network)?;

        let (head, incoming) = resp.into_parts();
        let raw = Limited::new(incoming, self.max_body_bytes)
            .collect()
            .await
            .map_err(FetchError::Body)?
            .to_bytes();

        let mut headers = head.headers;
        let body = if is_gzip(&headers) {
            let decoded = gunzip(&raw).map_err(FetchError::Decode)?;
            debug!(
                target: "herd::proxy",
                compressed = raw.len(),
                decoded = decoded.len(),
                "Decoded gzip body"
            );
            // The declared length was for the compressed body.
            headers.remove(CONTENT_LENGTH);
            decoded
        } else {
            raw
        };

        Ok(CacheEntry::new(
            head.status,
            cacheable_headers(headers),
            body,
            self.ttl,
        ))
    }
}
