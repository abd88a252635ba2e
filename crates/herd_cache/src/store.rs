use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use tracing::debug;

use crate::entry::CacheEntry;
use crate::key::CacheKey;

/// In-memory response store with lazy TTL expiry.
///
/// There is no sweeper and no size bound: an entry lives until a lookup
/// observes that it has expired.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    inner: DashMap<CacheKey, Arc<CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.get_at(key, Instant::now())
    }

    /// Lookup against an explicit clock reading.
    ///
    /// An expired entry is evicted and reported as absent. Eviction re-checks
    /// expiry under the shard lock so a fresh entry written concurrently by
    /// `put` survives.
    pub fn get_at(&self, key: &CacheKey, now: Instant) -> Option<Arc<CacheEntry>> {
        {
            let entry = self.inner.get(key)?;
            if !entry.is_expired_at(now) {
                return Some(Arc::clone(entry.value()));
            }
        }

        // The read guard above must be gone before we lock the shard again.
        if self
            .inner
            .remove_if(key, |_, entry| entry.is_expired_at(now))
            .is_some()
        {
            debug!(target: "herd::cache", key = %key, "Evicted expired cache entry");
        }

        None
    }

    pub fn put(&self, key: CacheKey, entry: Arc<CacheEntry>) {
        debug!(
            target: "herd::cache",
            key = %key,
            status = entry.status.as_u16(),
            body_len = entry.body.len(),
            "Stored cache entry"
        );
        self.inner.insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
