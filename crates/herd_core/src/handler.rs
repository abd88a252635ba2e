use std::sync::Arc;

use bytes::Bytes;
use herd_cache::{
    CacheEntry, CacheKey, FollowerHandle, InFlightRegister, LeaderHandle, MemoryCacheStore, Role,
};
use herd_config::HerdConfig;
use herd_http::HttpResponse;
use herd_http::responses::{CacheStatus, cached_response, send_400, send_413, send_502};
use herd_proxy::{FetchError, UpstreamFetcher};
use http::Request;
use http::request::Parts;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Body;
use tracing::{Instrument, debug, error, instrument, warn};

/// What a fetch publishes to its followers. Both sides are shared, so every
/// follower gets the same entry (or the same error) without copying it.
pub type FetchOutcome = Result<Arc<CacheEntry>, Arc<FetchError>>;

/// =======================================================
/// REQUEST HANDLER
/// =======================================================
///
/// Per request:
///
///   cache hit  -> HIT
///   miss       -> join the in-flight fetch for the key (COALESCED)
///              -> or lead one: re-check cache, fetch, store, publish (MISS)
///
/// Upstream failures become a 502 for the leader and all its followers and
/// leave the cache untouched.
pub struct Handler {
    store: Arc<MemoryCacheStore>,
    inflight: InFlightRegister<CacheKey, FetchOutcome>,
    fetcher: Arc<UpstreamFetcher>,
    max_request_body: usize,
}

impl Handler {
    pub fn new(fetcher: UpstreamFetcher, max_request_body: usize) -> Self {
        Self {
            store: Arc::new(MemoryCacheStore::new()),
            inflight: InFlightRegister::new(),
            fetcher: Arc::new(fetcher),
            max_request_body,
        }
    }

    pub fn from_config(cfg: &HerdConfig) -> Self {
        let fetcher = UpstreamFetcher::new(cfg.upstream(), cfg.cache().ttl());
        Self::new(fetcher, cfg.server().max_request_body_bytes())
    }

    pub fn store(&self) -> &MemoryCacheStore {
        &self.store
    }

    pub fn inflight(&self) -> &InFlightRegister<CacheKey, FetchOutcome> {
        &self.inflight
    }

    #[instrument(
        target = "herd::worker",
        name = "request",
        skip(self, req),
        fields(method = %req.method(), uri = %req.uri())
    )]
    pub async fn handle<B>(&self, req: Request<B>) -> HttpResponse
    where
        B: Body<Data = Bytes> + Send,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        let (parts, body) = req.into_parts();

        let body = match self.read_body(body).await {
            Ok(bytes) => bytes,
            Err(resp) => return resp,
        };

        let key = CacheKey::from_parts(&parts);

        if let Some(entry) = self.store.get(&key) {
            debug!(
                target: "herd::cache",
                %key,
                remaining_ttl = ?entry.remaining_ttl(),
                "Cache hit"
            );
            return cached_response(&entry, CacheStatus::Hit);
        }

        match self.inflight.join_or_start(key) {
            Role::Follower(follower) => self.follow(follower).await,
            Role::Leader(leader) => self.lead(leader, parts, body).await,
        }
    }

    async fn follow(&self, follower: FollowerHandle<FetchOutcome>) -> HttpResponse {
        match follower.wait().await {
            Ok(Ok(entry)) => cached_response(&entry, CacheStatus::Coalesced),
            Ok(Err(e)) => send_502(&e.report()),
            Err(abandoned) => send_502(&FetchError::from(abandoned).report()),
        }
    }

    async fn lead(
        &self,
        leader: LeaderHandle<CacheKey, FetchOutcome>,
        parts: Parts,
        body: Bytes,
    ) -> HttpResponse {
        // A previous leader may have stored the entry between our lookup and
        // the reservation.
        if let Some(entry) = self.store.get(leader.key()) {
            debug!(target: "herd::cache", key = %leader.key(), "Cache filled while reserving");
            leader.complete(Ok(Arc::clone(&entry)));
            return cached_response(&entry, CacheStatus::Hit);
        }

        // The fetch owns the leader handle and runs detached, so followers
        // still get an outcome if this client goes away.
        let store = Arc::clone(&self.store);
        let fetcher = Arc::clone(&self.fetcher);
        let task = tokio::spawn(
            async move {
                let outcome: FetchOutcome = match fetcher.fetch(&parts, body).await {
                    Ok(entry) => {
                        let entry = Arc::new(entry);
                        store.put(leader.key().clone(), Arc::clone(&entry));
                        Ok(entry)
                    }
                    Err(e) => Err(Arc::new(e)),
                };
                leader.complete(outcome.clone());
                outcome
            }
            .in_current_span(),
        );

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(target: "herd::worker", error = ?e, "Fetch task failed");
                Err(Arc::new(FetchError::Abandoned))
            }
        };

        match outcome {
            Ok(entry) => cached_response(&entry, CacheStatus::Miss),
            Err(e) => send_502(&e.report()),
        }
    }

    async fn read_body<B>(&self, body: B) -> Result<Bytes, HttpResponse>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        match Limited::new(body, self.max_request_body).collect().await {
            Ok(collected) => Ok(collected.to_bytes()),
            Err(e) if e.is::<LengthLimitError>() => {
                warn!(
                    target: "herd::worker",
                    limit = self.max_request_body,
                    "Request body over limit"
                );
                Err(send_413())
            }
            Err(e) => {
                warn!(target: "herd::worker", error = %e, "Failed to read request body");
                Err(send_400())
            }
        }
    }
}
