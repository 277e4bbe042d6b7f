//! External cache store trait and statistics.

use std::time::Duration;

use parlance_core::ParlanceResult;

/// External key/value cache shared across requests and processes.
///
/// Stores opaque bytes under string keys. Implementations must be
/// thread-safe; reads and writes are independent and best-effort, there is
/// no transactional isolation between them.
///
/// # Misses
///
/// `get` returns `Ok(None)` for absent and expired keys. A stored value is
/// never reported as empty-but-present in place of a miss.
pub trait TranslationCacheStore: Send + Sync {
    /// Get the bytes stored under `key`.
    fn get(&self, key: &str) -> ParlanceResult<Option<Vec<u8>>>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// `ttl` of `None` keeps the entry until it is deleted or cleared.
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> ParlanceResult<()>;

    /// Delete `key`. Returns whether an entry was removed.
    fn delete(&self, key: &str) -> ParlanceResult<bool>;

    /// Remove every entry regardless of prefix.
    fn clear(&self) -> ParlanceResult<()>;

    /// Get cache statistics.
    fn stats(&self) -> ParlanceResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, expired entries included.
    pub misses: u64,
    /// Number of entries currently in cache.
    pub entry_count: u64,
    /// Number of entries dropped because their TTL elapsed.
    pub expirations: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_hit_rate() {
        let stats = CacheStats {
            hits: 80,
            misses: 20,
            ..Default::default()
        };
        assert!((stats.hit_rate() - 0.8).abs() < 0.001);

        let empty_stats = CacheStats::default();
        assert!((empty_stats.hit_rate() - 0.0).abs() < 0.001);
    }
}
