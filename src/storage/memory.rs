use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::{CacheEntry, CacheError, CacheKey};
use super::CacheStore;

/// In-process cache backend.
///
/// Entries live for the lifetime of the store. Useful for embedding in a
/// long-running server where a disk cache is not wanted, and for seeding
/// entries at explicit timestamps.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert bytes as if they had been stored at `stored_at`.
    pub fn insert_at(&self, key: CacheKey, bytes: impl Into<Vec<u8>>, stored_at: DateTime<Utc>) {
        self.insert_entry(
            key,
            CacheEntry {
                bytes: bytes.into(),
                stored_at: Some(stored_at),
            },
        );
    }

    pub fn insert_entry(&self, key: CacheKey, entry: CacheEntry) {
        self.lock().insert(key, entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A panic while holding the lock cannot leave a half-written entry:
    // every mutation is a single map insert.
    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CacheStore for MemoryCacheStore {
    fn load(&self, key: &CacheKey) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.lock().get(key).cloned())
    }

    fn stored_at(&self, key: &CacheKey) -> Result<Option<DateTime<Utc>>, CacheError> {
        Ok(self.lock().get(key).and_then(|entry| entry.stored_at))
    }

    fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<(), CacheError> {
        self.insert_at(key.clone(), bytes, Utc::now());
        Ok(())
    }
}
