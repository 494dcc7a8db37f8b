//! Memoization of merged chunks.
//!
//! The BPE engine caches the merged form of every chunk it has seen, keyed by
//! the full byte-level chunk string. Caching is an optimization only: every
//! policy here, including [`NoMergeCache`], produces identical token ids.
//!
//! Caches are owned by a single engine instance. Two tokenizers built over
//! different vocabularies never share one.

use lru::LruCache;
use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::sync::Mutex;

/// Default capacity of the bounded chunk cache.
pub const DEFAULT_CACHE_SIZE: usize = 4096;

/// Storage for merged chunk results.
///
/// Implementations must be safe to share between threads. A poisoned lock
/// means "cache miss", never a panic.
pub trait MergeCache: Send + Sync {
    /// Merged result for `chunk`, if cached.
    fn get(&self, chunk: &str) -> Option<String>;

    fn insert(&self, chunk: &str, merged: &str);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&self);

    /// A new, empty cache with the same policy.
    fn fork(&self) -> Box<dyn MergeCache>;
}

/// Bounded least-recently-used cache.
pub struct LruMergeCache {
    inner: Mutex<LruCache<String, String>>,
    capacity: NonZeroUsize,
}

impl LruMergeCache {
    /// Create a cache holding at most `capacity` chunks (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl Default for LruMergeCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SIZE)
    }
}

impl MergeCache for LruMergeCache {
    fn get(&self, chunk: &str) -> Option<String> {
        let mut cache = self.inner.lock().ok()?;
        cache.get(chunk).cloned()
    }

    fn insert(&self, chunk: &str, merged: &str) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.put(chunk.to_string(), merged.to_string());
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn clear(&self) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.clear();
        }
    }

    fn fork(&self) -> Box<dyn MergeCache> {
        Box::new(Self::new(self.capacity.get()))
    }
}

/// Grow-forever cache: every distinct chunk stays for the cache's lifetime.
#[derive(Default)]
pub struct UnboundedMergeCache {
    inner: Mutex<FxHashMap<String, String>>,
}

impl UnboundedMergeCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MergeCache for UnboundedMergeCache {
    fn get(&self, chunk: &str) -> Option<String> {
        let cache = self.inner.lock().ok()?;
        cache.get(chunk).cloned()
    }

    fn insert(&self, chunk: &str, merged: &str) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.insert(chunk.to_string(), merged.to_string());
        }
    }

    fn len(&self) -> usize {
        self.inner.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn clear(&self) {
        if let Ok(mut cache) = self.inner.lock() {
            cache.clear();
        }
    }

    fn fork(&self) -> Box<dyn MergeCache> {
        Box::new(Self::new())
    }
}

/// Caching disabled; every chunk is merged from scratch.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMergeCache;

impl MergeCache for NoMergeCache {
    fn get(&self, _chunk: &str) -> Option<String> {
        None
    }

    fn insert(&self, _chunk: &str, _merged: &str) {}

    fn len(&self) -> usize {
        0
    }

    fn clear(&self) {}

    fn fork(&self) -> Box<dyn MergeCache> {
        Box::new(NoMergeCache)
    }
}

/// Declarative cache policy, e.g. `{"lru": {"capacity": 1024}}` or `"disabled"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheConfig {
    Lru { capacity: usize },
    Unbounded,
    Disabled,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::Lru {
            capacity: DEFAULT_CACHE_SIZE,
        }
    }
}

impl CacheConfig {
    pub fn build(&self) -> Box<dyn MergeCache> {
        match *self {
            Self::Lru { capacity } => Box::new(LruMergeCache::new(capacity)),
            Self::Unbounded => Box::new(UnboundedMergeCache::new()),
            Self::Disabled => Box::new(NoMergeCache),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lru_evicts_oldest() {
        let cache = LruMergeCache::new(2);
        cache.insert("a", "a");
        cache.insert("bc", "b c");
        assert_eq!(cache.get("a").as_deref(), Some("a"));
        cache.insert("de", "d e");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get("bc"), None);
        assert_eq!(cache.get("de").as_deref(), Some("d e"));
    }

    #[test]
    fn test_lru_zero_capacity_is_clamped() {
        let cache = LruMergeCache::new(0);
        assert_eq!(cache.capacity(), 1);
        cache.insert("x", "x");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unbounded_keeps_everything() {
        let cache = UnboundedMergeCache::new();
        for i in 0..10_000 {
            cache.insert(&i.to_string(), "v");
        }
        assert_eq!(cache.len(), 10_000);
        cache.clear();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_disabled_never_stores() {
        let cache = NoMergeCache;
        cache.insert("ab", "a b");
        assert_eq!(cache.get("ab"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_fork_is_empty_with_same_policy() {
        let cache = LruMergeCache::new(7);
        cache.insert("ab", "ab");
        let forked = cache.fork();
        assert!(forked.is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_cache_config_from_json() {
        let cfg: CacheConfig = serde_json::from_str(r#"{"lru": {"capacity": 16}}"#).unwrap();
        assert_eq!(cfg, CacheConfig::Lru { capacity: 16 });
        let cfg: CacheConfig = serde_json::from_str(r#""disabled""#).unwrap();
        assert_eq!(cfg, CacheConfig::Disabled);
        let cfg: CacheConfig = serde_json::from_str(r#""unbounded""#).unwrap();
        assert_eq!(cfg, CacheConfig::Unbounded);
        assert_eq!(
            CacheConfig::default(),
            CacheConfig::Lru {
                capacity: DEFAULT_CACHE_SIZE
            }
        );
    }
}
