//! Typed translation cache over a [`TranslationCacheStore`].
//!
//! Callers pass the settings snapshot taken for the current operation so a
//! single resolution never mixes two prefixes or two timeouts.

use std::sync::Arc;

use parlance_core::{
    LanguageCode, ParlanceResult, RecordId, TranslationConfig, TranslationVariant,
};
use tracing::{trace, warn};

use super::entry::CacheEntry;
use super::key::TranslationCacheKey;
use super::traits::{CacheStats, TranslationCacheStore};

/// Translation cache bound to one external store.
pub struct TranslationCache<C: TranslationCacheStore> {
    store: Arc<C>,
}

impl<C: TranslationCacheStore> Clone for TranslationCache<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<C: TranslationCacheStore> TranslationCache<C> {
    pub fn new(store: Arc<C>) -> Self {
        Self { store }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &C {
        &self.store
    }

    /// Key of one variant under the configured prefix.
    pub fn key(
        &self,
        config: &TranslationConfig,
        entity_type: &str,
        record_id: RecordId,
        language_code: &LanguageCode,
    ) -> TranslationCacheKey {
        TranslationCacheKey::new(
            config.cache_key_prefix.as_str(),
            entity_type,
            record_id,
            language_code.clone(),
        )
    }

    /// Read the entry under `key`.
    ///
    /// An entry that cannot be decoded is treated as absent.
    pub fn get_entry(&self, key: &TranslationCacheKey) -> ParlanceResult<Option<CacheEntry>> {
        let key_text = key.to_string();
        let Some(bytes) = self.store.get(&key_text)? else {
            trace!(key = %key_text, "translation cache miss");
            return Ok(None);
        };
        match CacheEntry::decode(&bytes) {
            Ok(entry) => {
                trace!(key = %key_text, needs_fallback = entry.is_needs_fallback(), "translation cache hit");
                Ok(Some(entry))
            }
            Err(e) => {
                warn!(key = %key_text, error = %e, "ignoring undecodable translation cache entry");
                Ok(None)
            }
        }
    }

    /// Cached variant of `key`, if a translation entry exists.
    pub fn get_translation(
        &self,
        key: &TranslationCacheKey,
    ) -> ParlanceResult<Option<TranslationVariant>> {
        Ok(self
            .get_entry(key)?
            .and_then(|entry| entry.into_variant(key.record_id(), key.language_code().clone())))
    }

    /// Store `variant`, replacing whatever the slot held.
    pub fn put_translation(
        &self,
        config: &TranslationConfig,
        entity_type: &str,
        variant: &TranslationVariant,
    ) -> ParlanceResult<()> {
        let key = self.key(
            config,
            entity_type,
            variant.record_id,
            &variant.language_code,
        );
        let bytes = CacheEntry::translation(variant).encode()?;
        self.store
            .set(&key.to_string(), &bytes, config.cache_ttl())
    }

    /// Store a fallback marker unless a translation is already cached.
    ///
    /// Returns whether the marker was written.
    pub fn put_needs_fallback(
        &self,
        config: &TranslationConfig,
        key: &TranslationCacheKey,
    ) -> ParlanceResult<bool> {
        if let Some(CacheEntry::Translation { .. }) = self.get_entry(key)? {
            return Ok(false);
        }
        let bytes = CacheEntry::NeedsFallback.encode()?;
        self.store
            .set(&key.to_string(), &bytes, config.cache_ttl())?;
        Ok(true)
    }

    pub fn delete(&self, key: &TranslationCacheKey) -> ParlanceResult<bool> {
        self.store.delete(&key.to_string())
    }

    /// Remove every entry of the store.
    pub fn clear(&self) -> ParlanceResult<()> {
        self.store.clear()
    }

    pub fn stats(&self) -> ParlanceResult<CacheStats> {
        self.store.stats()
    }
}
