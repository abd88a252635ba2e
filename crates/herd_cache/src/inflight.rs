//! In-flight register: at most one upstream fetch per key.
//!
//! The first caller for a key becomes the leader and owns a completion
//! signal. Every caller that arrives before the leader completes becomes a
//! follower of that same signal. The signal is a `watch` channel holding the
//! terminal outcome, so every follower observes the value no matter when it
//! started waiting. Dropping the leader without completing closes the channel
//! and wakes followers with [`Abandoned`].

use std::{fmt, hash::Hash, sync::Arc};

use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::watch;
use tracing::{debug, warn};

type Slot<T> = Arc<watch::Sender<Option<T>>>;

/// The leader went away (panic, cancelled task) without publishing an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("in-flight fetch was abandoned before completing")]
pub struct Abandoned;

/// Concurrent key -> in-flight fetch map.
pub struct InFlightRegister<K, T> {
    inner: Arc<DashMap<K, Slot<T>>>,
}

/// Role handed out by [`InFlightRegister::join_or_start`].
pub enum Role<K: Eq + Hash + fmt::Display, T> {
    Leader(LeaderHandle<K, T>),
    Follower(FollowerHandle<T>),
}

impl<K, T> InFlightRegister<K, T>
where
    K: Eq + Hash + Clone + fmt::Display,
    T: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }

    /// Reserve the key or join the fetch already running for it.
    ///
    /// Lookup and insert happen under a single shard lock, so two callers can
    /// never both become leader for the same key.
    pub fn join_or_start(&self, key: K) -> Role<K, T> {
        match self.inner.entry(key) {
            Entry::Occupied(slot) => {
                debug!(target: "herd::cache", key = %slot.key(), "Joining in-flight fetch");
                Role::Follower(FollowerHandle {
                    rx: slot.get().subscribe(),
                })
            }
            Entry::Vacant(slot) => {
                let (tx, _) = watch::channel(None);
                let tx = Arc::new(tx);
                let key = slot.key().clone();
                slot.insert(Arc::clone(&tx));

                debug!(target: "herd::cache", key = %key, "Started in-flight fetch");
                Role::Leader(LeaderHandle {
                    key,
                    tx,
                    inner: Arc::clone(&self.inner),
                })
            }
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl<K, T> Default for InFlightRegister<K, T>
where
    K: Eq + Hash + Clone + fmt::Display,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Owned by the single caller responsible for the fetch.
///
/// The key is released from the register when the handle is dropped, whether
/// or not [`LeaderHandle::complete`] was called.
pub struct LeaderHandle<K: Eq + Hash + fmt::Display, T> {
    key: K,
    tx: Slot<T>,
    inner: Arc<DashMap<K, Slot<T>>>,
}

impl<K: Eq + Hash + fmt::Display, T> LeaderHandle<K, T> {
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Number of followers currently attached to this fetch.
    pub fn waiters(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Publish the terminal outcome, wake every follower and free the key.
    pub fn complete(self, outcome: T) {
        let waiters = self.waiters();
        self.tx.send_replace(Some(outcome));
        if waiters > 0 {
            debug!(
                target: "herd::cache",
                key = %self.key,
                waiters,
                "Notified coalesced waiters"
            );
        }
    }
}

impl<K: Eq + Hash + fmt::Display, T> Drop for LeaderHandle<K, T> {
    fn drop(&mut self) {
        if self.tx.borrow().is_none() {
            warn!(
                target: "herd::cache",
                key = %self.key,
                waiters = self.tx.receiver_count(),
                "In-flight fetch dropped without an outcome"
            );
        }

        // A later leader may already own the key; only remove our own slot.
        self.inner
            .remove_if(&self.key, |_, slot| Arc::ptr_eq(slot, &self.tx));
    }
}

/// Waits for the outcome published by a leader.
pub struct FollowerHandle<T> {
    rx: watch::Receiver<Option<T>>,
}

impl<T: Clone> FollowerHandle<T> {
    /// Suspends until the leader completes, then returns its outcome.
    pub async fn wait(mut self) -> Result<T, Abandoned> {
        let outcome = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| Abandoned)?;
        let value = Option::clone(&outcome);
        drop(outcome);
        value.ok_or(Abandoned)
    }
}
