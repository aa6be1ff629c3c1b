//! Bounded in-memory memo of recent translation results

use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use tracing::debug;

use crate::core::models::TranslationResult;

/// Default number of cached results
pub const CACHE_MAX_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    engine: String,
    target_lang: String,
    text_hash: u64,
}

impl CacheKey {
    fn new(text: &str, target_lang: &str, engine: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        Self {
            engine: engine.to_string(),
            target_lang: target_lang.to_string(),
            text_hash: hasher.finish(),
        }
    }
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, TranslationResult>,
    insertion_order: VecDeque<CacheKey>,
}

/// Translation result cache
///
/// Keys hash the text, so a collision serves another text's result; this is a
/// performance cache, not an index. When full, the older half is dropped in
/// one sweep.
#[derive(Debug)]
pub struct TranslationCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(2),
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, text: &str, target_lang: &str, engine: &str) -> Option<TranslationResult> {
        let key = CacheKey::new(text, target_lang, engine);
        self.inner.lock().entries.get(&key).cloned()
    }

    pub fn put(&self, text: &str, target_lang: &str, engine: &str, result: TranslationResult) {
        let key = CacheKey::new(text, target_lang, engine);
        let mut inner = self.inner.lock();

        if let Some(existing) = inner.entries.get_mut(&key) {
            *existing = result;
            return;
        }

        if inner.entries.len() >= self.capacity {
            let evict = self.capacity / 2;
            for _ in 0..evict {
                if let Some(old) = inner.insertion_order.pop_front() {
                    inner.entries.remove(&old);
                }
            }
            debug!("Translation cache full, evicted {} entries", evict);
        }

        inner.insertion_order.push_back(key.clone());
        inner.entries.insert(key, result);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.insertion_order.clear();
    }
}

impl Default for TranslationCache {
    fn default() -> Self {
        Self::new(CACHE_MAX_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(text: &str) -> TranslationResult {
        TranslationResult {
            translation: text.to_uppercase(),
            detected_lang: "English".to_string(),
            target_lang: "中文".to_string(),
            engine: "openai".to_string(),
            latency_seconds: 0.3,
        }
    }

    #[test]
    fn test_key_includes_engine_and_target() {
        let cache = TranslationCache::new(10);
        cache.put("hi", "中文", "openai", result("hi"));

        assert!(cache.get("hi", "中文", "openai").is_some());
        assert!(cache.get("hi", "中文", "claude").is_none());
        assert!(cache.get("hi", "English", "openai").is_none());
        assert!(cache.get("hey", "中文", "openai").is_none());
    }

    #[test]
    fn test_full_cache_evicts_oldest_half() {
        let cache = TranslationCache::new(4);
        for text in ["a", "b", "c", "d"] {
            cache.put(text, "中文", "openai", result(text));
        }
        assert_eq!(cache.len(), 4);

        cache.put("e", "中文", "openai", result("e"));
        assert_eq!(cache.len(), 3);
        assert!(cache.get("a", "中文", "openai").is_none());
        assert!(cache.get("b", "中文", "openai").is_none());
        assert!(cache.get("c", "中文", "openai").is_some());
        assert!(cache.get("e", "中文", "openai").is_some());
    }

    #[test]
    fn test_overwrite_does_not_grow() {
        let cache = TranslationCache::new(4);
        cache.put("a", "中文", "openai", result("a"));
        cache.put("a", "中文", "openai", result("second"));

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get("a", "中文", "openai").unwrap().translation,
            "SECOND"
        );

        cache.clear();
        assert!(cache.is_empty());
    }
}
