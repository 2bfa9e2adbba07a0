use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use lru::LruCache;

use super::compile::CompiledRule;

/// Cached outcome of compiling one rule source.
#[derive(Debug, Clone)]
pub enum CachedRule {
    Compiled(Arc<CompiledRule>),
    /// Compilation failed; the source is not retried while cached.
    Invalid,
}

/// Compile cache keyed by rule source text.
pub trait RuleCache: Send + Sync {
    fn get(&self, source: &str) -> Option<CachedRule>;
    fn insert(&self, source: String, rule: CachedRule);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bounded least-recently-used cache.
pub struct LruRuleCache {
    inner: Mutex<LruCache<String, CachedRule>>,
}

impl LruRuleCache {
    /// A zero capacity is treated as one.
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(cap)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cap()
            .get()
    }
}

impl RuleCache for LruRuleCache {
    fn get(&self, source: &str) -> Option<CachedRule> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .cloned()
    }

    fn insert(&self, source: String, rule: CachedRule) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(source, rule);
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Unbounded cache, for tests and short-lived tools.
#[derive(Default)]
pub struct MapRuleCache {
    inner: Mutex<HashMap<String, CachedRule>>,
}

impl MapRuleCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RuleCache for MapRuleCache {
    fn get(&self, source: &str) -> Option<CachedRule> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .cloned()
    }

    fn insert(&self, source: String, rule: CachedRule) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(source, rule);
    }

    fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
