//! Whole-command result caching.

use super::output::GitOutput;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Default number of cached command results.
const DEFAULT_CAPACITY: usize = 500;

/// Key for a cached result: the invocation's common path, its expanded
/// command line, and any input that can change the output (stdin and
/// environment overrides).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub scope: PathBuf,
    pub command_line: String,
    pub stdin: Option<Arc<[u8]>>,
    pub env: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(scope: impl Into<PathBuf>, command_line: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            command_line: command_line.into(),
            stdin: None,
            env: Vec::new(),
        }
    }

    pub fn with_stdin(mut self, stdin: Option<Arc<[u8]>>) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn with_env(mut self, env: &[(String, String)]) -> Self {
        self.env = env.to_vec();
        self
    }
}

/// LRU cache of successful git results.
///
/// Only exit-0 results are stored; entries live until evicted or reset.
pub struct ResultCache {
    entries: Mutex<LruCache<CacheKey, GitOutput>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResultCache {
    /// Create a new cache with the specified capacity.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);

        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Get a cached result.
    pub fn get(&self, key: &CacheKey) -> Option<GitOutput> {
        let found = self
            .entries
            .lock()
            .ok()
            .and_then(|mut guard| guard.get(key).cloned());

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Store a result. Nonzero exits are ignored.
    pub fn put(&self, key: CacheKey, output: &GitOutput) -> bool {
        if output.exit_code != 0 {
            return false;
        }
        if let Ok(mut guard) = self.entries.lock() {
            guard.put(key, output.clone());
            return true;
        }
        false
    }

    /// Drop entries whose scope is `scope` or lies below it.
    pub fn invalidate_scope(&self, scope: &Path) -> usize {
        let Ok(mut guard) = self.entries.lock() else {
            return 0;
        };

        // LruCache has no retain, so collect the keys first
        let stale: Vec<CacheKey> = guard
            .iter()
            .filter(|(key, _)| key.scope.starts_with(scope))
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            guard.pop(key);
        }
        stale.len()
    }

    /// Invalidate the entire cache.
    pub fn invalidate_all(&self) {
        if let Ok(mut guard) = self.entries.lock() {
            guard.clear();
        }
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.lock().map(|g| g.len()).unwrap_or(0),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(stdout: &str, exit_code: i32) -> GitOutput {
        GitOutput::new(stdout.as_bytes().to_vec(), String::new(), exit_code)
    }

    #[test]
    fn test_cache_set_and_get() {
        let cache = ResultCache::new(10);
        let key = CacheKey::new("/repo", "git rev-parse HEAD");
        assert!(cache.put(key.clone(), &output("abc\n", 0)));

        let hit = cache.get(&key).unwrap();
        assert_eq!(hit.text_lossy(), "abc\n");
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_cache_miss_counted() {
        let cache = ResultCache::new(10);
        assert!(cache.get(&CacheKey::new("/repo", "git status")).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_nonzero_exit_not_cached() {
        let cache = ResultCache::new(10);
        let key = CacheKey::new("/repo", "git show nope");
        assert!(!cache.put(key.clone(), &output("", 128)));
        assert!(cache.get(&key).is_none());
    }

    #[test]
    fn test_invalidate_scope() {
        let cache = ResultCache::new(10);
        cache.put(CacheKey::new("/repo/a", "git log"), &output("a", 0));
        cache.put(CacheKey::new("/repo/a/sub", "git log"), &output("s", 0));
        cache.put(CacheKey::new("/repo/b", "git log"), &output("b", 0));

        assert_eq!(cache.invalidate_scope(Path::new("/repo/a")), 2);
        assert!(cache.get(&CacheKey::new("/repo/a", "git log")).is_none());
        assert!(cache.get(&CacheKey::new("/repo/b", "git log")).is_some());
    }

    #[test]
    fn test_key_includes_input() {
        let cache = ResultCache::new(10);
        let base = CacheKey::new("/repo", "git hash-object --stdin");
        let one = base.clone().with_stdin(Some(Arc::from(&b"one"[..])));
        let two = base.clone().with_stdin(Some(Arc::from(&b"two"[..])));
        cache.put(one.clone(), &output("1", 0));

        assert!(cache.get(&two).is_none());
        assert!(cache.get(&base).is_none());
        assert!(cache.get(&base.with_env(&[("A".into(), "b".into())])).is_none());
        assert_eq!(cache.get(&one).unwrap().text_lossy(), "1");
    }

    #[test]
    fn test_invalidate_all() {
        let cache = ResultCache::default();
        cache.put(CacheKey::new("/repo", "git log"), &output("x", 0));
        cache.invalidate_all();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = ResultCache::new(2);
        for i in 0..3 {
            cache.put(CacheKey::new("/repo", format!("git show {i}")), &output("x", 0));
        }
        assert!(cache.get(&CacheKey::new("/repo", "git show 0")).is_none());
        assert!(cache.get(&CacheKey::new("/repo", "git show 2")).is_some());
    }

    #[test]
    fn test_zero_capacity_uses_default() {
        let cache = ResultCache::new(0);
        assert!(cache.put(CacheKey::new("/repo", "git log"), &output("x", 0)));
        assert_eq!(cache.stats().entries, 1);
    }
}
