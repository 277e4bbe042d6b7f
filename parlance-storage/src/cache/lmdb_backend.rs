//! LMDB-backed external cache.
//!
//! Uses the heed crate (Rust bindings for LMDB) as a memory-mapped,
//! persistent key/value store. Several processes opening the same
//! directory share one cache.
//!
//! # Value Format
//!
//! `[expires_at: 8 bytes, i64 LE millis, 0 = never][payload]`
//!
//! Expired entries are reported as misses and removed on read. Removal
//! re-reads the entry inside its write transaction, so a value written
//! since the read is kept.
//!
//! # Thread Safety
//!
//! LMDB provides ACID transactions:
//! - Read transactions for `get` and `stats`
//! - Write transactions for `set`, `delete`, `clear` and expiry cleanup

use std::path::Path;
use std::sync::RwLock;
use std::time::Duration;

use chrono::Utc;
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use parlance_core::{CacheError, ParlanceError, ParlanceResult};
use tracing::debug;

use super::traits::{CacheStats, TranslationCacheStore};

/// Length of the expiry header.
const HEADER_LEN: usize = 8;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Stored value is shorter than its header.
    #[error("Corrupt cache value under {key}")]
    Corrupt { key: String },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for ParlanceError {
    fn from(e: LmdbCacheError) -> Self {
        ParlanceError::Cache(CacheError::Backend {
            reason: e.to_string(),
        })
    }
}

fn txn_error(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// LMDB-backed [`TranslationCacheStore`].
pub struct LmdbCacheStore {
    env: Env,
    /// Single unnamed database holding every prefix.
    db: Database<Bytes, Bytes>,
    stats: RwLock<CacheStats>,
}

impl LmdbCacheStore {
    /// Open (or create) a cache under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        // SAFETY: the environment is opened once per store and the
        // directory is not opened twice within this process.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_error)?;

        debug!(path = %path.as_ref().display(), max_size_mb, "opened LMDB translation cache");

        Ok(Self {
            env,
            db,
            stats: RwLock::new(CacheStats::default()),
        })
    }

    fn record(&self, f: impl FnOnce(&mut CacheStats)) {
        if let Ok(mut stats) = self.stats.write() {
            f(&mut stats);
        }
    }

    fn encode_value(value: &[u8], ttl: Option<Duration>) -> Vec<u8> {
        let expires_at = ttl
            .and_then(|ttl| chrono::Duration::from_std(ttl).ok())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
            .map(|at| at.timestamp_millis())
            .unwrap_or(0);

        let mut bytes = Vec::with_capacity(HEADER_LEN + value.len());
        bytes.extend_from_slice(&expires_at.to_le_bytes());
        bytes.extend_from_slice(value);
        bytes
    }

    /// Split a stored value into expiry millis and payload.
    fn decode_value<'a>(key: &str, bytes: &'a [u8]) -> Result<(i64, &'a [u8]), LmdbCacheError> {
        if bytes.len() < HEADER_LEN {
            return Err(LmdbCacheError::Corrupt {
                key: key.to_string(),
            });
        }
        let (header, payload) = bytes.split_at(HEADER_LEN);
        let header: [u8; HEADER_LEN] = header.try_into().map_err(|_| LmdbCacheError::Corrupt {
            key: key.to_string(),
        })?;
        Ok((i64::from_le_bytes(header), payload))
    }

    /// Delete `key` if its stored value is expired at `now_millis`.
    fn remove_if_expired(&self, key: &str, now_millis: i64) -> Result<bool, LmdbCacheError> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let expired = match self.db.get(&wtxn, key.as_bytes()).map_err(txn_error)? {
            Some(bytes) => {
                let (expires_at, _) = Self::decode_value(key, bytes)?;
                is_expired(expires_at, now_millis)
            }
            None => false,
        };
        if expired {
            self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_error)?;
        }
        wtxn.commit().map_err(txn_error)?;
        Ok(expired)
    }
}

fn is_expired(expires_at: i64, now_millis: i64) -> bool {
    expires_at != 0 && expires_at <= now_millis
}

impl TranslationCacheStore for LmdbCacheStore {
    fn get(&self, key: &str) -> ParlanceResult<Option<Vec<u8>>> {
        let (expires_at, payload) = {
            let rtxn = self.env.read_txn().map_err(txn_error)?;
            match self.db.get(&rtxn, key.as_bytes()).map_err(txn_error)? {
                Some(bytes) => {
                    let (expires_at, payload) = Self::decode_value(key, bytes)?;
                    (expires_at, payload.to_vec())
                }
                None => {
                    self.record(|s| s.misses += 1);
                    return Ok(None);
                }
            }
        };

        let now_millis = Utc::now().timestamp_millis();
        if is_expired(expires_at, now_millis) {
            self.remove_if_expired(key, now_millis)?;
            self.record(|s| {
                s.misses += 1;
                s.expirations += 1;
            });
            return Ok(None);
        }

        self.record(|s| s.hits += 1);
        Ok(Some(payload))
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> ParlanceResult<()> {
        let bytes = Self::encode_value(value, ttl);
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .put(&mut wtxn, key.as_bytes(), &bytes)
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> ParlanceResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let deleted = self.db.delete(&mut wtxn, key.as_bytes()).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(deleted)
    }

    fn clear(&self) -> ParlanceResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.clear(&mut wtxn).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    fn stats(&self) -> ParlanceResult<CacheStats> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let entry_count = self.db.len(&rtxn).map_err(txn_error)?;
        let mut stats = self
            .stats
            .read()
            .map(|s| s.clone())
            .map_err(|_| ParlanceError::Cache(CacheError::LockPoisoned))?;
        stats.entry_count = entry_count;
        Ok(stats)
    }
}
