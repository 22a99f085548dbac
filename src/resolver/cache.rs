//! Link cache interface and an in-memory implementation.
//!
//! Durable stores live outside this crate; they implement [`LinkCache`].

use std::time::SystemTime;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

/// A resolved link remembered until it expires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedLink {
    pub url: String,
    pub expires_at: SystemTime,
}

impl CachedLink {
    #[must_use]
    pub fn new(url: impl Into<String>, expires_at: SystemTime) -> Self {
        Self {
            url: url.into(),
            expires_at,
        }
    }

    #[must_use]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now >= self.expires_at
    }
}

/// Store of resolved links keyed by provider type and share key.
#[async_trait]
pub trait LinkCache: Send + Sync {
    /// Returns the cached link, if any. Implementations may return expired entries;
    /// callers check [`CachedLink::is_expired_at`].
    async fn get(&self, parser_type: &str, share_key: &str) -> Option<CachedLink>;

    /// Stores or replaces the link for `(parser_type, share_key)`.
    async fn put(&self, parser_type: &str, share_key: &str, link: CachedLink);
}

/// Process-local [`LinkCache`] that drops expired entries on read.
#[derive(Debug, Default)]
pub struct MemoryLinkCache {
    entries: DashMap<String, CachedLink>,
}

impl MemoryLinkCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(parser_type: &str, share_key: &str) -> String {
        format!("{parser_type}:{share_key}")
    }
}

#[async_trait]
impl LinkCache for MemoryLinkCache {
    async fn get(&self, parser_type: &str, share_key: &str) -> Option<CachedLink> {
        let key = Self::key(parser_type, share_key);
        let link = self.entries.get(&key).map(|entry| entry.value().clone())?;
        if link.is_expired_at(SystemTime::now()) {
            debug!(key = %key, "Evicting expired cached link");
            self.entries.remove(&key);
            return None;
        }
        Some(link)
    }

    async fn put(&self, parser_type: &str, share_key: &str, link: CachedLink) {
        self.entries.insert(Self::key(parser_type, share_key), link);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_cache_round_trip() {
        let cache = MemoryLinkCache::new();
        let expires = SystemTime::now() + Duration::from_secs(600);
        cache
            .put("lz", "abc", CachedLink::new("https://cdn.example.com/a", expires))
            .await;

        let hit = cache.get("lz", "abc").await.unwrap();
        assert_eq!(hit.url, "https://cdn.example.com/a");
        assert!(cache.get("lz", "other").await.is_none());
        assert!(cache.get("fj", "abc").await.is_none());
    }

    #[tokio::test]
    async fn test_memory_cache_evicts_expired_on_read() {
        let cache = MemoryLinkCache::new();
        let expired = SystemTime::now() - Duration::from_secs(1);
        cache
            .put("lz", "abc", CachedLink::new("https://cdn.example.com/a", expired))
            .await;
        assert_eq!(cache.len(), 1);
        assert!(cache.get("lz", "abc").await.is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cached_link_expiry_boundary() {
        let at = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let link = CachedLink::new("u", at);
        assert!(!link.is_expired_at(at - Duration::from_secs(1)));
        assert!(link.is_expired_at(at));
    }
}
