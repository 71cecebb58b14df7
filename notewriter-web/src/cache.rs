use notewriter_common::truncate_chars;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);
const KEY_PREFIX_CHARS: usize = 100;

#[derive(Debug, Clone)]
struct CacheEntry {
    stored_at: Instant,
    text: String,
}

/// Formatted search text keyed by query prefix and requested result count.
///
/// Expired entries are dropped when they are looked up, and `put` sweeps any
/// other stale entries while it holds the lock.
#[derive(Debug)]
pub struct SearchCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl SearchCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn key(query: &str, max_results: usize) -> String {
        format!("{}_{}", truncate_chars(query, KEY_PREFIX_CHARS), max_results)
    }

    pub async fn get(&self, query: &str, max_results: usize) -> Option<String> {
        let key = Self::key(query, max_results);
        let mut entries = self.entries.lock().await;
        match entries.get(&key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => Some(entry.text.clone()),
            Some(_) => {
                entries.remove(&key);
                tracing::debug!(%key, "search.cache.expired");
                None
            }
            None => None,
        }
    }

    pub async fn put(&self, query: &str, max_results: usize, text: String) {
        let key = Self::key(query, max_results);
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let ttl = self.ttl;
        entries.retain(|_, e| now.duration_since(e.stored_at) < ttl);
        entries.insert(
            key,
            CacheEntry {
                stored_at: now,
                text,
            },
        );
    }

    pub async fn entry_count(&self) -> usize {
        self.entries.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_uses_first_hundred_chars() {
        let long = "x".repeat(150);
        let key = SearchCache::key(&long, 8);
        assert_eq!(key, format!("{}_8", "x".repeat(100)));
        assert_ne!(SearchCache::key("q", 5), SearchCache::key("q", 8));
    }

    #[tokio::test(start_paused = true)]
    async fn round_trip_then_expiry() {
        let cache = SearchCache::new(Duration::from_secs(300));
        cache.put("senator bill", 8, "results".into()).await;
        assert_eq!(cache.get("senator bill", 8).await.as_deref(), Some("results"));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert_eq!(cache.get("senator bill", 8).await, None);
        assert_eq!(cache.entry_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn queries_sharing_a_prefix_share_an_entry() {
        let cache = SearchCache::default();
        let base = "a".repeat(100);
        cache.put(&format!("{base} tail one"), 3, "hit".into()).await;
        assert_eq!(
            cache.get(&format!("{base} tail two"), 3).await.as_deref(),
            Some("hit")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn put_sweeps_stale_entries() {
        let cache = SearchCache::new(Duration::from_secs(10));
        cache.put("old", 1, "stale".into()).await;
        tokio::time::advance(Duration::from_secs(11)).await;
        cache.put("new", 1, "fresh".into()).await;
        assert_eq!(cache.entry_count().await, 1);
    }
}
