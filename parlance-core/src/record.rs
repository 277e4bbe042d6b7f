//! Translatable records, translation variants, and the object-local cache.

use crate::{LanguageCode, RecordId, Timestamp, TranslatableModelMeta};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

// ============================================================================
// TRANSLATION VARIANT
// ============================================================================

/// The language-specific field set of one record.
///
/// At most one variant exists per (record, language) in a translation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationVariant {
    pub record_id: RecordId,
    pub language_code: LanguageCode,
    pub fields: BTreeMap<String, String>,
}

impl TranslationVariant {
    /// Create an empty variant.
    pub fn new(record_id: RecordId, language_code: LanguageCode) -> Self {
        Self {
            record_id,
            language_code,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Read a field value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Assign a field value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Remove a field value, returning it.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.fields.remove(name)
    }
}

// ============================================================================
// OBJECT-LOCAL CACHE
// ============================================================================

/// State of one language in a record's object-local cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalTranslation {
    /// The variant is loaded on this instance.
    Loaded(TranslationVariant),
    /// The backing store was checked for this instance and had no variant.
    Missing,
}

impl LocalTranslation {
    pub fn as_loaded(&self) -> Option<&TranslationVariant> {
        match self {
            Self::Loaded(variant) => Some(variant),
            Self::Missing => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }
}

/// Base row of a translatable record as returned by the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRow {
    pub id: RecordId,
    pub created_at: Timestamp,
    /// Untranslated datetime columns, by field name.
    #[serde(default)]
    pub datetimes: BTreeMap<String, Timestamp>,
}

impl RecordRow {
    pub fn new(id: RecordId, created_at: Timestamp) -> Self {
        Self {
            id,
            created_at,
            datetimes: BTreeMap::new(),
        }
    }

    /// Builder-style datetime column assignment.
    pub fn with_datetime(mut self, field: impl Into<String>, value: Timestamp) -> Self {
        self.datetimes.insert(field.into(), value);
        self
    }
}

// ============================================================================
// TRANSLATABLE RECORD
// ============================================================================

/// A loaded record with its per-instance translation cache.
///
/// The cache lives as long as this instance and is never persisted. It is
/// filled by the resolver and the prefetch coordinator; callers read
/// translated fields through those components rather than through the
/// cache directly.
#[derive(Debug, Clone)]
pub struct TranslatableRecord {
    id: RecordId,
    created_at: Timestamp,
    datetimes: BTreeMap<String, Timestamp>,
    meta: Arc<TranslatableModelMeta>,
    /// Language used for field reads that name none.
    current_language: Option<LanguageCode>,
    /// relation name -> language -> state
    translations_cache: HashMap<String, HashMap<LanguageCode, LocalTranslation>>,
    /// Relations whose full variant set was loaded in bulk.
    prefetched: HashSet<String>,
    /// Variants changed on this instance and not yet saved.
    modified: HashMap<String, BTreeSet<LanguageCode>>,
}

impl TranslatableRecord {
    /// Create a record with an empty translation cache.
    pub fn new(row: RecordRow, meta: Arc<TranslatableModelMeta>) -> Self {
        Self {
            id: row.id,
            created_at: row.created_at,
            datetimes: row.datetimes,
            meta,
            current_language: None,
            translations_cache: HashMap::new(),
            prefetched: HashSet::new(),
            modified: HashMap::new(),
        }
    }

    pub fn id(&self) -> RecordId {
        self.id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Value of an untranslated datetime column.
    pub fn datetime(&self, field: &str) -> Option<Timestamp> {
        self.datetimes.get(field).copied()
    }

    /// The base row this record was loaded from.
    pub fn row(&self) -> RecordRow {
        RecordRow {
            id: self.id,
            created_at: self.created_at,
            datetimes: self.datetimes.clone(),
        }
    }

    pub fn meta(&self) -> &TranslatableModelMeta {
        &self.meta
    }

    pub fn current_language(&self) -> Option<&LanguageCode> {
        self.current_language.as_ref()
    }

    /// Set the language used by reads that do not name one.
    pub fn set_current_language(&mut self, language: Option<LanguageCode>) {
        self.current_language = language;
    }

    /// Shared handle to the model metadata.
    pub fn meta_arc(&self) -> Arc<TranslatableModelMeta> {
        Arc::clone(&self.meta)
    }

    /// State of `language` in the object-local cache, if it was ever checked.
    pub fn local_translation(
        &self,
        rel_name: &str,
        language: &LanguageCode,
    ) -> Option<&LocalTranslation> {
        self.translations_cache
            .get(rel_name)
            .and_then(|languages| languages.get(language))
    }

    /// Mutable access to a loaded variant.
    pub fn loaded_translation_mut(
        &mut self,
        rel_name: &str,
        language: &LanguageCode,
    ) -> Option<&mut TranslationVariant> {
        match self
            .translations_cache
            .get_mut(rel_name)
            .and_then(|languages| languages.get_mut(language))
        {
            Some(LocalTranslation::Loaded(variant)) => Some(variant),
            _ => None,
        }
    }

    /// Store a loaded variant in the object-local cache.
    pub fn cache_translation(&mut self, rel_name: &str, variant: TranslationVariant) {
        self.translations_cache
            .entry(rel_name.to_string())
            .or_default()
            .insert(variant.language_code.clone(), LocalTranslation::Loaded(variant));
    }

    /// Remember that the backing store has no variant for `language`.
    ///
    /// A loaded variant is never downgraded to missing.
    pub fn cache_missing(&mut self, rel_name: &str, language: LanguageCode) {
        self.translations_cache
            .entry(rel_name.to_string())
            .or_default()
            .entry(language)
            .or_insert(LocalTranslation::Missing);
    }

    /// Drop the cached state of `language`.
    pub fn forget_translation(&mut self, rel_name: &str, language: &LanguageCode) {
        if let Some(languages) = self.translations_cache.get_mut(rel_name) {
            languages.remove(language);
        }
        if let Some(modified) = self.modified.get_mut(rel_name) {
            modified.remove(language);
        }
    }

    /// Languages with a loaded variant, in sorted order.
    pub fn loaded_languages(&self, rel_name: &str) -> Vec<LanguageCode> {
        let mut languages: Vec<LanguageCode> = self
            .translations_cache
            .get(rel_name)
            .map(|languages| {
                languages
                    .iter()
                    .filter(|(_, state)| !state.is_missing())
                    .map(|(language, _)| language.clone())
                    .collect()
            })
            .unwrap_or_default();
        languages.sort();
        languages
    }

    /// Any loaded variant, preferring the given languages in order.
    pub fn any_loaded_translation(
        &self,
        rel_name: &str,
        preferred: &[LanguageCode],
    ) -> Option<&TranslationVariant> {
        let languages = self.translations_cache.get(rel_name)?;
        preferred
            .iter()
            .find_map(|language| languages.get(language).and_then(LocalTranslation::as_loaded))
            .or_else(|| {
                // Deterministic pick among the remaining languages.
                self.loaded_languages(rel_name)
                    .first()
                    .and_then(|language| languages.get(language))
                    .and_then(LocalTranslation::as_loaded)
            })
    }

    pub fn is_prefetched(&self, rel_name: &str) -> bool {
        self.prefetched.contains(rel_name)
    }

    /// Mark `rel_name` as bulk-loaded: languages absent from the cache are missing.
    pub fn mark_prefetched(&mut self, rel_name: &str) {
        self.prefetched.insert(rel_name.to_string());
    }

    /// Record a local change to `language` that still has to be saved.
    pub fn mark_modified(&mut self, rel_name: &str, language: LanguageCode) {
        self.modified
            .entry(rel_name.to_string())
            .or_default()
            .insert(language);
    }

    pub fn is_modified(&self, rel_name: &str, language: &LanguageCode) -> bool {
        self.modified
            .get(rel_name)
            .map(|languages| languages.contains(language))
            .unwrap_or(false)
    }

    /// Take the set of unsaved languages for `rel_name`, clearing it.
    pub fn take_modified(&mut self, rel_name: &str) -> BTreeSet<LanguageCode> {
        self.modified.remove(rel_name).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TranslationExtension;
    use chrono::Utc;

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::new(code).expect("valid language code")
    }

    fn make_record(id: u64) -> TranslatableRecord {
        let meta = TranslatableModelMeta::new(
            "testapp.SimpleModel",
            TranslationExtension::new("translations", "testapp.SimpleModelTranslation")
                .with_field("tr_title"),
        )
        .expect("valid meta");
        TranslatableRecord::new(RecordRow::new(RecordId::new(id), Utc::now()), Arc::new(meta))
    }

    #[test]
    fn test_new_record_has_empty_cache() {
        let record = make_record(1);
        assert!(record.local_translation("translations", &lang("en")).is_none());
        assert!(record.loaded_languages("translations").is_empty());
        assert!(!record.is_prefetched("translations"));
    }

    #[test]
    fn test_cache_translation_then_read() {
        let mut record = make_record(1);
        record.cache_translation(
            "translations",
            TranslationVariant::new(record.id(), lang("en")).with_field("tr_title", "Norway"),
        );

        let cached = record
            .local_translation("translations", &lang("en"))
            .and_then(LocalTranslation::as_loaded)
            .expect("variant cached");
        assert_eq!(cached.get("tr_title"), Some("Norway"));
    }

    #[test]
    fn test_missing_never_downgrades_loaded() {
        let mut record = make_record(1);
        record.cache_translation("translations", TranslationVariant::new(record.id(), lang("en")));
        record.cache_missing("translations", lang("en"));
        assert!(!record
            .local_translation("translations", &lang("en"))
            .expect("state present")
            .is_missing());
    }

    #[test]
    fn test_loaded_translation_replaces_missing() {
        let mut record = make_record(1);
        record.cache_missing("translations", lang("fr"));
        record.cache_translation("translations", TranslationVariant::new(record.id(), lang("fr")));
        assert_eq!(record.loaded_languages("translations"), vec![lang("fr")]);
    }

    #[test]
    fn test_any_loaded_translation_prefers_order() {
        let mut record = make_record(1);
        record.cache_translation(
            "translations",
            TranslationVariant::new(record.id(), lang("de")).with_field("tr_title", "Norwegen"),
        );
        record.cache_translation(
            "translations",
            TranslationVariant::new(record.id(), lang("fr")).with_field("tr_title", "Norvège"),
        );

        let preferred = record
            .any_loaded_translation("translations", &[lang("nl"), lang("fr")])
            .expect("one loaded");
        assert_eq!(preferred.language_code, lang("fr"));

        let any = record
            .any_loaded_translation("translations", &[lang("nl")])
            .expect("one loaded");
        assert_eq!(any.language_code, lang("de"));
    }

    #[test]
    fn test_modified_tracking() {
        let mut record = make_record(1);
        record.mark_modified("translations", lang("en"));
        assert!(record.is_modified("translations", &lang("en")));
        let taken = record.take_modified("translations");
        assert_eq!(taken.into_iter().collect::<Vec<_>>(), vec![lang("en")]);
        assert!(!record.is_modified("translations", &lang("en")));
    }

    #[test]
    fn test_forget_translation_clears_state() {
        let mut record = make_record(1);
        record.cache_translation("translations", TranslationVariant::new(record.id(), lang("en")));
        record.mark_modified("translations", lang("en"));
        record.forget_translation("translations", &lang("en"));
        assert!(record.local_translation("translations", &lang("en")).is_none());
        assert!(!record.is_modified("translations", &lang("en")));
    }

    #[test]
    fn test_row_keeps_datetimes_and_language() {
        let meta = make_record(1).meta_arc();
        let when = Utc::now();
        let mut record = TranslatableRecord::new(
            RecordRow::new(RecordId::new(7), when).with_datetime("datetime", when),
            meta,
        );
        assert_eq!(record.datetime("datetime"), Some(when));
        assert_eq!(record.datetime("other"), None);
        assert_eq!(record.row().datetimes.len(), 1);

        assert!(record.current_language().is_none());
        record.set_current_language(Some(lang("nl")));
        assert_eq!(record.current_language(), Some(&lang("nl")));
    }
}
