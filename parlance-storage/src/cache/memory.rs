//! Process-local cache store with TTL expiry.

use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parlance_core::{CacheError, ParlanceError, ParlanceResult};

use super::traits::{CacheStats, TranslationCacheStore};

#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| at <= now).unwrap_or(false)
    }
}

/// In-memory [`TranslationCacheStore`].
///
/// Shared by every resolver holding the same `Arc`, which makes it the
/// process-wide external cache in tests and single-process deployments.
#[derive(Debug, Default)]
pub struct InMemoryCacheStore {
    entries: RwLock<HashMap<String, StoredValue>>,
    stats: RwLock<CacheStats>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live and not yet purged entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All keys currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .entries
            .read()
            .map(|e| e.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    fn with_stats(&self, f: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }
}

impl TranslationCacheStore for InMemoryCacheStore {
    fn get(&self, key: &str) -> ParlanceResult<Option<Vec<u8>>> {
        let now = Utc::now();
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ParlanceError::Cache(CacheError::LockPoisoned))?;

        match entries.get(key) {
            Some(value) if value.is_expired(now) => {
                entries.remove(key);
                self.with_stats(|s| {
                    s.misses += 1;
                    s.expirations += 1;
                });
                Ok(None)
            }
            Some(value) => {
                self.with_stats(|s| s.hits += 1);
                Ok(Some(value.bytes.clone()))
            }
            None => {
                self.with_stats(|s| s.misses += 1);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> ParlanceResult<()> {
        let expires_at = ttl.and_then(|ttl| {
            chrono::Duration::from_std(ttl)
                .ok()
                .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        });

        let mut entries = self
            .entries
            .write()
            .map_err(|_| ParlanceError::Cache(CacheError::LockPoisoned))?;
        entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value.to_vec(),
                expires_at,
            },
        );
        Ok(())
    }

    fn delete(&self, key: &str) -> ParlanceResult<bool> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ParlanceError::Cache(CacheError::LockPoisoned))?;
        Ok(entries.remove(key).is_some())
    }

    fn clear(&self) -> ParlanceResult<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| ParlanceError::Cache(CacheError::LockPoisoned))?;
        entries.clear();
        Ok(())
    }

    fn stats(&self) -> ParlanceResult<CacheStats> {
        let mut stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .map_err(|_| ParlanceError::Cache(CacheError::LockPoisoned))?;
        stats.entry_count = self.len() as u64;
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_absent_is_miss() {
        let store = InMemoryCacheStore::new();
        assert_eq!(store.get("missing").expect("get"), None);
        assert_eq!(store.stats().expect("stats").misses, 1);
    }

    #[test]
    fn test_set_then_get() {
        let store = InMemoryCacheStore::new();
        store.set("a.b.1.en", b"value", None).expect("set");
        assert_eq!(store.get("a.b.1.en").expect("get"), Some(b"value".to_vec()));
        let stats = store.stats().expect("stats");
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn test_empty_value_is_still_a_hit() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"", None).expect("set");
        assert_eq!(store.get("k").expect("get"), Some(Vec::new()));
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let store = InMemoryCacheStore::new();
        store
            .set("k", b"v", Some(Duration::from_millis(1)))
            .expect("set");
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(store.get("k").expect("get"), None);
        let stats = store.stats().expect("stats");
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.entry_count, 0);
    }

    #[test]
    fn test_overwrite_replaces_value() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"old", None).expect("set");
        store.set("k", b"new", None).expect("set");
        assert_eq!(store.get("k").expect("get"), Some(b"new".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete() {
        let store = InMemoryCacheStore::new();
        store.set("k", b"v", None).expect("set");
        assert!(store.delete("k").expect("delete"));
        assert!(!store.delete("k").expect("delete"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_removes_all_namespaces() {
        let store = InMemoryCacheStore::new();
        store.set("site-a.app.T.1.en", b"v", None).expect("set");
        store.set("site-b.app.T.1.en", b"v", None).expect("set");
        store.set("app.T.1.en", b"v", None).expect("set");
        store.clear().expect("clear");
        assert!(store.is_empty());
    }
}
