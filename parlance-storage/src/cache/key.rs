//! Prefix-scoped cache keys for translation entries.
//!
//! Every key embeds the configured prefix, so entries written under one
//! prefix (tenant, site, deployment) are never visible under another.

use std::fmt;

use parlance_core::{LanguageCode, RecordId};

/// Separator between key segments.
const SEPARATOR: char = '.';

/// Build the cache key of one translation variant.
///
/// - empty prefix: `{entity_type}.{record_id}.{language_code}`
/// - otherwise: `{prefix}.{entity_type}.{record_id}.{language_code}`
pub fn get_translation_cache_key(
    entity_type: &str,
    record_id: RecordId,
    language_code: &LanguageCode,
    prefix: &str,
) -> String {
    TranslationCacheKey::new(prefix, entity_type, record_id, language_code.clone()).to_string()
}

/// A cache key scoped to a configured prefix.
///
/// # Design
///
/// The private inner struct means a key can only be built through
/// [`TranslationCacheKey::new`], which requires the prefix. Code paths
/// cannot forget the prefix and read another tenant's entries.
///
/// # Text Format
///
/// `[prefix.]entity_type.record_id.language_code`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationCacheKey {
    inner: KeyInner,
}

/// Private inner struct - prevents external construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct KeyInner {
    prefix: String,
    entity_type: String,
    record_id: RecordId,
    language_code: LanguageCode,
}

impl TranslationCacheKey {
    /// Create a key for one translation variant.
    pub fn new(
        prefix: impl Into<String>,
        entity_type: impl Into<String>,
        record_id: RecordId,
        language_code: LanguageCode,
    ) -> Self {
        Self {
            inner: KeyInner {
                prefix: prefix.into(),
                entity_type: entity_type.into(),
                record_id,
                language_code,
            },
        }
    }

    pub fn prefix(&self) -> &str {
        &self.inner.prefix
    }

    pub fn entity_type(&self) -> &str {
        &self.inner.entity_type
    }

    pub fn record_id(&self) -> RecordId {
        self.inner.record_id
    }

    pub fn language_code(&self) -> &LanguageCode {
        &self.inner.language_code
    }
}

impl fmt::Display for TranslationCacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.inner.prefix.is_empty() {
            write!(f, "{}{SEPARATOR}", self.inner.prefix)?;
        }
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.inner.entity_type, self.inner.record_id, self.inner.language_code
        )
    }
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn language_strategy() -> impl Strategy<Value = LanguageCode> {
        "[a-z]{2}(-[a-z]{2,4})?".prop_map(|code| LanguageCode::new(code).expect("valid code"))
    }

    fn prefix_strategy() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), "[a-z][a-z0-9-]{0,11}"]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        /// Property: key building is deterministic.
        #[test]
        fn prop_key_is_deterministic(
            prefix in prefix_strategy(),
            id in any::<u64>(),
            language in language_strategy(),
        ) {
            let a = get_translation_cache_key("app.T", RecordId::new(id), &language, &prefix);
            let b = get_translation_cache_key("app.T", RecordId::new(id), &language, &prefix);
            prop_assert_eq!(a, b);
        }

        /// Property: the prefix is joined by exactly one separator.
        #[test]
        fn prop_prefix_single_separator(
            prefix in "[a-z][a-z0-9-]{0,11}",
            id in any::<u64>(),
            language in language_strategy(),
        ) {
            let bare = get_translation_cache_key("app.T", RecordId::new(id), &language, "");
            let scoped = get_translation_cache_key("app.T", RecordId::new(id), &language, &prefix);
            prop_assert_eq!(scoped, format!("{prefix}.{bare}"));
        }

        /// Property: different (prefix, id, language) triples never collide.
        #[test]
        fn prop_key_is_injective(
            prefix1 in prefix_strategy(),
            prefix2 in prefix_strategy(),
            id1 in any::<u64>(),
            id2 in any::<u64>(),
            language1 in language_strategy(),
            language2 in language_strategy(),
        ) {
            let key1 = TranslationCacheKey::new(prefix1, "app.T", RecordId::new(id1), language1);
            let key2 = TranslationCacheKey::new(prefix2, "app.T", RecordId::new(id2), language2);

            if key1 == key2 {
                prop_assert_eq!(key1.to_string(), key2.to_string());
            } else {
                prop_assert_ne!(key1.to_string(), key2.to_string());
            }
        }
    }
}
