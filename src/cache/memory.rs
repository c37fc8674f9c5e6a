//! In-process cache.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::time::Instant;

use super::{Cache, CacheError, CacheKey};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Single-instance cache backed by a [`DashMap`].
///
/// Expired entries are dropped lazily, when they are next read.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<CacheKey, Entry>,
}

impl MemoryCache {
    /// Create a new, empty [`MemoryCache`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.entries.remove_if(key, |_, entry| entry.is_expired());
        }

        Ok(None)
    }

    async fn set(
        &self,
        key: &CacheKey,
        value: String,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        self.entries.insert(
            key.clone(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, keys: &[CacheKey]) -> Result<(), CacheError> {
        for key in keys {
            self.entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::DEFAULT_TTL;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        let key = CacheKey::UserId("1".into());

        assert_eq!(cache.get(&key).await.unwrap(), None);

        cache.set(&key, "one".into(), DEFAULT_TTL).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap().as_deref(), Some("one"));

        cache.delete(&[key.clone(), CacheKey::AllUsers]).await.unwrap();
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_expires_after_ttl() {
        let cache = MemoryCache::new();
        let key = CacheKey::AllUsers;
        cache.set(&key, "[]".into(), DEFAULT_TTL).await.unwrap();

        tokio::time::advance(DEFAULT_TTL - Duration::from_secs(1)).await;
        assert!(cache.get(&key).await.unwrap().is_some());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&key).await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rewrite_does_not_extend_other_keys() {
        let cache = MemoryCache::new();
        let first = CacheKey::UserId("1".into());
        let second = CacheKey::UserId("2".into());
        cache.set(&first, "1".into(), DEFAULT_TTL).await.unwrap();

        tokio::time::advance(DEFAULT_TTL / 2).await;
        cache.set(&second, "2".into(), DEFAULT_TTL).await.unwrap();
        // Reading does not refresh.
        assert!(cache.get(&first).await.unwrap().is_some());

        tokio::time::advance(DEFAULT_TTL / 2).await;
        assert_eq!(cache.get(&first).await.unwrap(), None);
        assert!(cache.get(&second).await.unwrap().is_some());
        assert_eq!(cache.len(), 1);
    }
}
