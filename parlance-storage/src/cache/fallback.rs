//! "Needs fallback" markers.
//!
//! A marker tells later readers, in this or another process, that a
//! language of a record resolved through its fallback chain. It is not a
//! negative cache entry: readers still query the backing store for the
//! marked language and only then walk the fallback chain, so a translation
//! stored later is found on the next read. The marker never overwrites a
//! cached translation, and saving a translation overwrites the marker.

use parlance_core::{LanguageCode, ParlanceResult, TranslatableRecord, TranslationConfig};
use tracing::debug;

use super::traits::TranslationCacheStore;
use super::translation_cache::TranslationCache;

/// Record in the external cache that `language_code` of `record` needs a
/// fallback for the translation relation `rel_name`.
///
/// Returns whether a marker was written. Nothing is written when caching is
/// disabled or when a translation entry already occupies the slot.
pub fn cache_translation_needs_fallback<C: TranslationCacheStore>(
    cache: &TranslationCache<C>,
    config: &TranslationConfig,
    record: &TranslatableRecord,
    language_code: &LanguageCode,
    rel_name: &str,
) -> ParlanceResult<bool> {
    if !config.caching_enabled {
        return Ok(false);
    }

    let extension = record.meta().extension(rel_name)?;
    let key = cache.key(
        config,
        extension.translation_entity(),
        record.id(),
        language_code,
    );
    let written = cache.put_needs_fallback(config, &key)?;
    if written {
        debug!(key = %key, "marked translation as needing fallback");
    }
    Ok(written)
}
