//! Response cache primitives: keys, entries, the TTL store and the
//! in-flight register used to coalesce concurrent misses.

pub mod entry;
pub mod inflight;
pub mod key;
pub mod store;

pub use entry::CacheEntry;
pub use inflight::{Abandoned, FollowerHandle, InFlightRegister, LeaderHandle, Role};
pub use key::CacheKey;
pub use store::MemoryCacheStore;
