use chrono::{DateTime, Utc};
use std::time::Duration;

use super::types::{CacheError, CacheKey};
use super::CacheStore;

/// URL-keyed view over a [`CacheStore`] that also decides staleness.
///
/// Callers work in feed URLs; the adapter derives the [`CacheKey`] and
/// applies the freshness policy on top of the store's raw
/// `(bytes, stored_at)` pairs.
#[derive(Debug)]
pub struct CacheAdapter<S> {
    store: S,
    stale_when_unknown: bool,
}

impl<S: CacheStore> CacheAdapter<S> {
    /// Missing entries and entries without a timestamp count as stale.
    pub fn new(store: S) -> Self {
        Self {
            store,
            stale_when_unknown: true,
        }
    }

    /// Whether an entry with no stored-at timestamp (or no entry at all)
    /// should be reported as stale.
    pub fn stale_when_unknown(mut self, stale: bool) -> Self {
        self.stale_when_unknown = stale;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    /// Cached bytes for `url`, or `None` when nothing has been stored.
    ///
    /// An empty stored blob is returned as `Some(vec![])`.
    pub fn get_data(&self, url: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let key = CacheKey::for_url(url);
        let entry = self.store.load(&key)?;
        tracing::debug!(url = %url, key = %key, hit = entry.is_some(), "Cache lookup");
        Ok(entry.map(|entry| entry.bytes))
    }

    /// Store `bytes` for `url`, replacing any previous entry.
    pub fn update_cache(&self, url: &str, bytes: &[u8]) -> Result<(), CacheError> {
        let key = CacheKey::for_url(url);
        self.store.store(&key, bytes)
    }

    /// Whether the entry for `url` is older than `max_age` right now.
    pub fn is_stale(&self, url: &str, max_age: Duration) -> Result<bool, CacheError> {
        self.is_stale_at(url, max_age, Utc::now())
    }

    /// Whether the entry for `url` is older than `max_age` at `now`.
    ///
    /// Age is compared at millisecond precision and the boundary itself is
    /// fresh: with a 300 s max-age, an entry 300 s old is fresh and one
    /// 300.001 s old is stale. Entries stamped in the future are fresh.
    pub fn is_stale_at(
        &self,
        url: &str,
        max_age: Duration,
        now: DateTime<Utc>,
    ) -> Result<bool, CacheError> {
        let key = CacheKey::for_url(url);
        let Some(stored_at) = self.store.stored_at(&key)? else {
            tracing::debug!(
                url = %url,
                stale = self.stale_when_unknown,
                "No cache timestamp, applying default staleness"
            );
            return Ok(self.stale_when_unknown);
        };

        let age_ms = now.signed_duration_since(stored_at).num_milliseconds();
        let max_age_ms = i64::try_from(max_age.as_millis()).unwrap_or(i64::MAX);
        let stale = age_ms > max_age_ms;

        tracing::debug!(
            url = %url,
            age_ms = age_ms,
            max_age_secs = max_age.as_secs(),
            stale = stale,
            "Cache staleness check"
        );
        Ok(stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{CacheEntry, MemoryCacheStore};
    use chrono::TimeZone;

    const URL: &str = "https://example.com/rss";

    fn stored_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn seeded() -> CacheAdapter<MemoryCacheStore> {
        let store = MemoryCacheStore::new();
        store.insert_at(CacheKey::for_url(URL), "<rss/>", stored_at());
        CacheAdapter::new(store)
    }

    #[test]
    fn test_get_data_miss_then_hit() {
        let cache = CacheAdapter::new(MemoryCacheStore::new());
        assert!(cache.get_data(URL).unwrap().is_none());

        cache.update_cache(URL, b"<rss/>").unwrap();
        assert_eq!(cache.get_data(URL).unwrap(), Some(b"<rss/>".to_vec()));
    }

    #[test]
    fn test_urls_do_not_alias() {
        let cache = CacheAdapter::new(MemoryCacheStore::new());
        cache.update_cache("https://a.example.com/rss", b"a").unwrap();
        cache.update_cache("https://b.example.com/rss", b"b").unwrap();

        assert_eq!(cache.get_data("https://a.example.com/rss").unwrap(), Some(b"a".to_vec()));
        assert_eq!(cache.get_data("https://b.example.com/rss").unwrap(), Some(b"b".to_vec()));
    }

    #[test]
    fn test_ttl_boundary_five_minutes() {
        let cache = seeded();
        let max_age = Duration::from_secs(5 * 60);

        let fresh = cache
            .is_stale_at(URL, max_age, stored_at() + chrono::Duration::seconds(299))
            .unwrap();
        let at_boundary = cache
            .is_stale_at(URL, max_age, stored_at() + chrono::Duration::seconds(300))
            .unwrap();
        let stale = cache
            .is_stale_at(URL, max_age, stored_at() + chrono::Duration::seconds(301))
            .unwrap();

        assert!(!fresh);
        assert!(!at_boundary);
        assert!(stale);
    }

    #[test]
    fn test_future_timestamp_is_fresh() {
        let cache = seeded();
        let now = stored_at() - chrono::Duration::hours(1);
        assert!(!cache.is_stale_at(URL, Duration::ZERO, now).unwrap());
    }

    #[test]
    fn test_missing_entry_is_stale_by_default() {
        let cache = CacheAdapter::new(MemoryCacheStore::new());
        assert!(cache.is_stale(URL, Duration::from_secs(3600)).unwrap());
    }

    #[test]
    fn test_missing_timestamp_follows_policy() {
        let store = MemoryCacheStore::new();
        store.insert_entry(
            CacheKey::for_url(URL),
            CacheEntry {
                bytes: b"<rss/>".to_vec(),
                stored_at: None,
            },
        );

        let cache = CacheAdapter::new(store);
        assert!(cache.is_stale(URL, Duration::from_secs(3600)).unwrap());

        let cache = cache.stale_when_unknown(false);
        assert!(!cache.is_stale(URL, Duration::from_secs(3600)).unwrap());
    }

    #[test]
    fn test_huge_max_age_never_stale() {
        let cache = seeded();
        let now = stored_at() + chrono::Duration::days(365 * 100);
        assert!(!cache.is_stale_at(URL, Duration::MAX, now).unwrap());
    }
}
