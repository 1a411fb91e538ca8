//! Raw feed caching.
//!
//! [`CacheAdapter`] is what the feed manager talks to: it maps feed URLs to
//! [`CacheKey`]s and decides staleness. Persistence is behind the
//! [`CacheStore`] trait, with a filesystem backend ([`DiskCacheStore`]) and an
//! in-process one ([`MemoryCacheStore`]).

mod cache;
mod disk;
mod memory;
mod types;

use chrono::{DateTime, Utc};
use std::sync::Arc;

pub use cache::CacheAdapter;
pub use disk::DiskCacheStore;
pub use memory::MemoryCacheStore;
pub use types::{CacheEntry, CacheError, CacheKey};

/// Key-value persistence of `(bytes, stored_at)` pairs.
///
/// Implementations must never fabricate content: a missing key is `None`,
/// which is distinct from an entry holding zero bytes. `store` replaces any
/// previous entry and must be atomic per key with respect to `load`.
pub trait CacheStore {
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError>;

    /// Stored-at time of the entry, without reading its bytes.
    fn stored_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, CacheError>;

    fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError>;
}

impl<S: CacheStore + ?Sized> CacheStore for Arc<S> {
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        (**self).load(key)
    }

    fn stored_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, CacheError> {
        (**self).stored_at(key)
    }

    fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        (**self).store(key, bytes)
    }
}
