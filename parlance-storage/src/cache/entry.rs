//! Values stored in the external cache.
//!
//! A cache slot is in exactly one of three states: absent, a definitive
//! translation, or a "needs fallback" marker. The last two are distinct
//! tags of [`CacheEntry`], so a marker can never be decoded as a
//! translation and absence can never be decoded as either.

use std::collections::BTreeMap;

use parlance_core::{
    CacheError, LanguageCode, ParlanceError, ParlanceResult, RecordId, TranslationVariant,
};
use serde::{Deserialize, Serialize};

/// Tagged external cache value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CacheEntry {
    /// The translation exists; the full field set is cached.
    Translation { fields: BTreeMap<String, String> },
    /// The language is known to resolve through its fallback chain.
    NeedsFallback,
}

impl CacheEntry {
    /// Entry caching `variant`.
    pub fn translation(variant: &TranslationVariant) -> Self {
        Self::Translation {
            fields: variant.fields.clone(),
        }
    }

    pub fn is_translation(&self) -> bool {
        matches!(self, Self::Translation { .. })
    }

    pub fn is_needs_fallback(&self) -> bool {
        matches!(self, Self::NeedsFallback)
    }

    /// Rebuild the variant of `record_id` in `language_code`.
    ///
    /// Returns `None` for a fallback marker.
    pub fn into_variant(
        self,
        record_id: RecordId,
        language_code: LanguageCode,
    ) -> Option<TranslationVariant> {
        match self {
            Self::Translation { fields } => Some(TranslationVariant {
                record_id,
                language_code,
                fields,
            }),
            Self::NeedsFallback => None,
        }
    }

    /// Serialize for the cache store.
    pub fn encode(&self) -> ParlanceResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| {
            ParlanceError::Cache(CacheError::Serialization {
                reason: e.to_string(),
            })
        })
    }

    /// Deserialize bytes read from the cache store.
    pub fn decode(bytes: &[u8]) -> ParlanceResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| {
            ParlanceError::Cache(CacheError::Serialization {
                reason: e.to_string(),
            })
        })
    }
}
