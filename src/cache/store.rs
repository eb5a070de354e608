//! Backends for the rendered-HTML cache.
//!
//! Entries carry no TTL. The only way an entry leaves is backend eviction.

use std::sync::{Arc, RwLock};

use lru::LruCache;
use metrics::counter;
use tracing::debug;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub const METRIC_MARKDOWN_CACHE_HIT: &str = "june_markdown_cache_hit_total";
pub const METRIC_MARKDOWN_CACHE_MISS: &str = "june_markdown_cache_miss_total";
pub const METRIC_MARKDOWN_CACHE_EVICT: &str = "june_markdown_cache_evict_total";

/// Key/value store for rendered HTML.
///
/// Writes are idempotent (a key always maps to the same derived value), so
/// implementations need no coordination beyond their own interior locking.
pub trait HtmlCache: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: String, html: String);
}

/// In-process LRU backend.
pub struct LruHtmlCache {
    entries: RwLock<LruCache<String, String>>,
}

impl LruHtmlCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl HtmlCache for LruHtmlCache {
    fn get(&self, key: &str) -> Option<String> {
        // LRU reads reorder entries, so they take the write lock.
        let hit = rw_write(&self.entries, SOURCE, "get").get(key).cloned();
        match hit {
            Some(_) => counter!(METRIC_MARKDOWN_CACHE_HIT).increment(1),
            None => counter!(METRIC_MARKDOWN_CACHE_MISS).increment(1),
        }
        hit
    }

    fn set(&self, key: String, html: String) {
        let evicted = rw_write(&self.entries, SOURCE, "set").push(key.clone(), html);
        if let Some((evicted_key, _)) = evicted
            && evicted_key != key
        {
            counter!(METRIC_MARKDOWN_CACHE_EVICT).increment(1);
            debug!(cache = "html", evicted = %evicted_key, "evicted rendered fragment");
        }
    }
}

/// Backend used when caching is switched off: every lookup misses.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledHtmlCache;

impl HtmlCache for DisabledHtmlCache {
    fn get(&self, _key: &str) -> Option<String> {
        counter!(METRIC_MARKDOWN_CACHE_MISS).increment(1);
        None
    }

    fn set(&self, _key: String, _html: String) {}
}

/// Build the backend selected by configuration.
pub fn build_html_cache(config: &CacheConfig) -> Arc<dyn HtmlCache> {
    if config.enabled {
        Arc::new(LruHtmlCache::new(config))
    } else {
        Arc::new(DisabledHtmlCache)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lru_roundtrip() {
        let cache = LruHtmlCache::new(&CacheConfig::default());
        assert!(cache.get("html:a").is_none());

        cache.set("html:a".to_string(), "<p>a</p>".to_string());
        assert_eq!(cache.get("html:a").as_deref(), Some("<p>a</p>"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn lru_evicts_least_recently_used() {
        let config = CacheConfig {
            capacity: 2,
            ..Default::default()
        };
        let cache = LruHtmlCache::new(&config);

        cache.set("html:a".to_string(), "a".to_string());
        cache.set("html:b".to_string(), "b".to_string());
        // Touch `a` so `b` becomes the eviction candidate.
        assert!(cache.get("html:a").is_some());
        cache.set("html:c".to_string(), "c".to_string());

        assert!(cache.get("html:b").is_none());
        assert!(cache.get("html:a").is_some());
        assert!(cache.get("html:c").is_some());
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let config = CacheConfig {
            capacity: 0,
            ..Default::default()
        };
        let cache = LruHtmlCache::new(&config);
        cache.set("html:a".to_string(), "a".to_string());
        cache.set("html:b".to_string(), "b".to_string());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn disabled_cache_never_stores() {
        let cache = build_html_cache(&CacheConfig {
            enabled: false,
            ..Default::default()
        });
        cache.set("html:a".to_string(), "a".to_string());
        assert!(cache.get("html:a").is_none());
    }
}
