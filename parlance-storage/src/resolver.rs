//! Translation resolution through the three cache layers.
//!
//! A translated field is looked up in this order:
//!
//! 1. the record's object-local cache,
//! 2. the external cache (a translation entry or a "needs fallback" marker),
//! 3. the backing store, one round-trip,
//! 4. the configured fallback languages, each through steps 1-3.
//!
//! Every store hit is cached on the record and, when caching is enabled,
//! written through to the external cache. An exhausted fallback chain is a
//! [`Resolution::Unavailable`], never an error. Store and cache failures
//! propagate unchanged.

use std::sync::Arc;

use parlance_core::{
    LanguageCode, LocalTranslation, ParlanceError, ParlanceResult, SettingsHandle, StorageError,
    TranslatableRecord, TranslationConfig, TranslationVariant,
};
use tracing::{debug, trace};

use crate::cache::{self, CacheEntry, TranslationCache, TranslationCacheStore};
use crate::TranslationStorage;

/// Layer a translation was served from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    ObjectCache,
    ExternalCache,
    BackingStore,
}

/// Outcome of resolving one (record, language) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A variant was found, either in the requested language or a fallback.
    Found {
        variant: TranslationVariant,
        source: ResolutionSource,
        requested: LanguageCode,
    },
    /// Neither the requested language nor any fallback has a variant.
    Unavailable,
}

impl Resolution {
    fn found(variant: TranslationVariant, source: ResolutionSource, requested: &LanguageCode) -> Self {
        Self::Found {
            variant,
            source,
            requested: requested.clone(),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn variant(&self) -> Option<&TranslationVariant> {
        match self {
            Self::Found { variant, .. } => Some(variant),
            Self::Unavailable => None,
        }
    }

    pub fn into_variant(self) -> Option<TranslationVariant> {
        match self {
            Self::Found { variant, .. } => Some(variant),
            Self::Unavailable => None,
        }
    }

    pub fn source(&self) -> Option<ResolutionSource> {
        match self {
            Self::Found { source, .. } => Some(*source),
            Self::Unavailable => None,
        }
    }

    /// Whether the variant is in a language other than the requested one.
    pub fn is_fallback(&self) -> bool {
        match self {
            Self::Found {
                variant, requested, ..
            } => variant.language_code != *requested,
            Self::Unavailable => false,
        }
    }
}

/// What the two cache layers know about one language.
enum CachedState {
    Found(TranslationVariant, ResolutionSource),
    /// The store was already checked for this instance.
    KnownMissing,
    NeedsFallback,
    NotCached,
}

/// Resolves translated fields of records.
///
/// # Type Parameters
///
/// - `S`: The backing store
/// - `C`: The external cache store
///
/// Settings are read once per operation from the shared
/// [`SettingsHandle`], so overrides apply to the next operation.
pub struct TranslationResolver<S, C>
where
    S: TranslationStorage,
    C: TranslationCacheStore,
{
    storage: Arc<S>,
    cache: TranslationCache<C>,
    settings: SettingsHandle,
}

impl<S, C> TranslationResolver<S, C>
where
    S: TranslationStorage,
    C: TranslationCacheStore,
{
    pub fn new(storage: Arc<S>, cache_store: Arc<C>, settings: SettingsHandle) -> Self {
        Self {
            storage,
            cache: TranslationCache::new(cache_store),
            settings,
        }
    }

    /// Get a reference to the backing store.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Shared handle to the backing store.
    pub fn storage_arc(&self) -> Arc<S> {
        Arc::clone(&self.storage)
    }

    pub fn cache(&self) -> &TranslationCache<C> {
        &self.cache
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// Snapshot of the live settings, rejected when invalid.
    fn current_config(&self) -> ParlanceResult<TranslationConfig> {
        let config = self.settings.current();
        config.validate()?;
        Ok(config)
    }

    /// External cache key of one variant of `record` under the current prefix.
    pub fn translation_cache_key(
        &self,
        record: &TranslatableRecord,
        rel_name: &str,
        language: &LanguageCode,
    ) -> ParlanceResult<String> {
        let config = self.current_config()?;
        let extension = record.meta().extension(rel_name)?;
        Ok(self
            .cache
            .key(&config, extension.translation_entity(), record.id(), language)
            .to_string())
    }

    /// Mark `language` of `record` as resolving through its fallback chain.
    ///
    /// See [`cache::fallback`].
    pub fn cache_translation_needs_fallback(
        &self,
        record: &TranslatableRecord,
        language: &LanguageCode,
        rel_name: &str,
    ) -> ParlanceResult<bool> {
        let config = self.current_config()?;
        cache::cache_translation_needs_fallback(&self.cache, &config, record, language, rel_name)
    }

    // ========================================================================
    // RESOLUTION
    // ========================================================================

    /// Resolve the variant of `record` in `language` for relation `rel_name`.
    pub fn get_translated_model(
        &self,
        record: &mut TranslatableRecord,
        rel_name: &str,
        language: &LanguageCode,
        use_fallback: bool,
    ) -> ParlanceResult<Resolution> {
        let config = self.current_config()?;
        let entity = record
            .meta()
            .extension(rel_name)?
            .translation_entity()
            .to_string();

        let queried_store = match self.lookup_cached(record, rel_name, &entity, language, &config)? {
            CachedState::Found(variant, source) => {
                trace!(record_id = %record.id(), %language, ?source, "translation resolved");
                return Ok(Resolution::found(variant, source, language));
            }
            CachedState::KnownMissing => false,
            // A marker is not a cached value; the requested language is re-checked.
            CachedState::NeedsFallback | CachedState::NotCached => true,
        };

        if queried_store {
            if let Some(variant) = self.fetch_from_store(record, rel_name, &entity, language, &config)? {
                return Ok(Resolution::found(variant, ResolutionSource::BackingStore, language));
            }
        }

        if !use_fallback {
            return Ok(Resolution::Unavailable);
        }

        for fallback in config.fallbacks_for(language) {
            let found = match self.lookup_cached(record, rel_name, &entity, &fallback, &config)? {
                CachedState::Found(variant, source) => Some((variant, source)),
                CachedState::KnownMissing => None,
                CachedState::NeedsFallback | CachedState::NotCached => self
                    .fetch_from_store(record, rel_name, &entity, &fallback, &config)?
                    .map(|variant| (variant, ResolutionSource::BackingStore)),
            };

            if let Some((variant, source)) = found {
                debug!(record_id = %record.id(), %language, %fallback, "using fallback translation");
                if queried_store {
                    cache::cache_translation_needs_fallback(
                        &self.cache,
                        &config,
                        record,
                        language,
                        rel_name,
                    )?;
                }
                return Ok(Resolution::found(variant, source, language));
            }
        }

        debug!(record_id = %record.id(), %language, "no translation available");
        Ok(Resolution::Unavailable)
    }

    /// Resolve any variant of `record`, preferring `language` and its fallbacks.
    pub fn get_any_translated_model(
        &self,
        record: &mut TranslatableRecord,
        rel_name: &str,
        language: &LanguageCode,
    ) -> ParlanceResult<Resolution> {
        let config = self.current_config()?;
        let entity = record
            .meta()
            .extension(rel_name)?
            .translation_entity()
            .to_string();

        let mut preferred = vec![language.clone()];
        preferred.extend(config.fallbacks_for(language));
        if let Some(variant) = record.any_loaded_translation(rel_name, &preferred) {
            return Ok(Resolution::found(
                variant.clone(),
                ResolutionSource::ObjectCache,
                language,
            ));
        }
        if record.is_prefetched(rel_name) {
            return Ok(Resolution::Unavailable);
        }

        match self.storage.translation_first(&entity, record.id())? {
            Some(variant) => {
                record.cache_translation(rel_name, variant.clone());
                if config.caching_enabled {
                    self.cache.put_translation(&config, &entity, &variant)?;
                }
                Ok(Resolution::found(variant, ResolutionSource::BackingStore, language))
            }
            None => Ok(Resolution::Unavailable),
        }
    }

    /// Steps 1 and 2: object-local cache, then external cache.
    fn lookup_cached(
        &self,
        record: &mut TranslatableRecord,
        rel_name: &str,
        entity: &str,
        language: &LanguageCode,
        config: &TranslationConfig,
    ) -> ParlanceResult<CachedState> {
        match record.local_translation(rel_name, language) {
            Some(LocalTranslation::Loaded(variant)) => {
                return Ok(CachedState::Found(
                    variant.clone(),
                    ResolutionSource::ObjectCache,
                ))
            }
            Some(LocalTranslation::Missing) => return Ok(CachedState::KnownMissing),
            None if record.is_prefetched(rel_name) => {
                record.cache_missing(rel_name, language.clone());
                return Ok(CachedState::KnownMissing);
            }
            None => {}
        }

        if !config.caching_enabled {
            return Ok(CachedState::NotCached);
        }

        let key = self.cache.key(config, entity, record.id(), language);
        match self.cache.get_entry(&key)? {
            Some(CacheEntry::Translation { fields }) => {
                let variant = TranslationVariant {
                    record_id: record.id(),
                    language_code: language.clone(),
                    fields,
                };
                record.cache_translation(rel_name, variant.clone());
                Ok(CachedState::Found(variant, ResolutionSource::ExternalCache))
            }
            Some(CacheEntry::NeedsFallback) => Ok(CachedState::NeedsFallback),
            None => Ok(CachedState::NotCached),
        }
    }

    /// Step 3: one backing-store round-trip, caching the outcome.
    fn fetch_from_store(
        &self,
        record: &mut TranslatableRecord,
        rel_name: &str,
        entity: &str,
        language: &LanguageCode,
        config: &TranslationConfig,
    ) -> ParlanceResult<Option<TranslationVariant>> {
        match self.storage.translation_get(entity, record.id(), language)? {
            Some(variant) => {
                record.cache_translation(rel_name, variant.clone());
                if config.caching_enabled {
                    self.cache.put_translation(config, entity, &variant)?;
                }
                Ok(Some(variant))
            }
            None => {
                record.cache_missing(rel_name, language.clone());
                Ok(None)
            }
        }
    }

    // ========================================================================
    // FIELD ACCESS
    // ========================================================================

    /// Value of translated `field` in `language`, falling back as configured.
    ///
    /// Fields declared `any_language` also accept a variant in any language
    /// once the fallback chain is exhausted. `None` means no translation is
    /// available or the variant has no value for the field.
    pub fn get_translated_field(
        &self,
        record: &mut TranslatableRecord,
        field: &str,
        language: &LanguageCode,
    ) -> ParlanceResult<Option<String>> {
        let (rel_name, any_language) = {
            let extension = record.meta().extension_for_field(field)?;
            let any_language = extension
                .field(field)
                .map(|spec| spec.any_language)
                .unwrap_or(false);
            (extension.rel_name().to_string(), any_language)
        };

        let mut resolution = self.get_translated_model(record, &rel_name, language, true)?;
        if !resolution.is_found() && any_language {
            resolution = self.get_any_translated_model(record, &rel_name, language)?;
        }
        Ok(resolution
            .variant()
            .and_then(|variant| variant.get(field))
            .map(str::to_string))
    }

    /// [`Self::get_translated_field`] in the record's current language, or
    /// the configured default language when it has none.
    pub fn get_current_translated_field(
        &self,
        record: &mut TranslatableRecord,
        field: &str,
    ) -> ParlanceResult<Option<String>> {
        let language = match record.current_language() {
            Some(language) => language.clone(),
            None => self.current_config()?.default_language,
        };
        self.get_translated_field(record, field, &language)
    }

    /// Value of `field` in `language`, its fallbacks or any language,
    /// `default` when no variant has a value.
    pub fn safe_translation_getter(
        &self,
        record: &mut TranslatableRecord,
        field: &str,
        language: &LanguageCode,
        default: &str,
    ) -> ParlanceResult<String> {
        let rel_name = record
            .meta()
            .extension_for_field(field)?
            .rel_name()
            .to_string();

        if let Some(value) = self
            .get_translated_model(record, &rel_name, language, true)?
            .variant()
            .and_then(|variant| variant.get(field))
        {
            return Ok(value.to_string());
        }

        Ok(self
            .get_any_translated_model(record, &rel_name, language)?
            .variant()
            .and_then(|variant| variant.get(field))
            .unwrap_or(default)
            .to_string())
    }

    /// Assign translated `field` in `language`, creating the variant locally
    /// when it does not exist yet. Never falls back.
    pub fn set_translated_field(
        &self,
        record: &mut TranslatableRecord,
        field: &str,
        value: impl Into<String>,
        language: &LanguageCode,
    ) -> ParlanceResult<()> {
        let rel_name = record
            .meta()
            .extension_for_field(field)?
            .rel_name()
            .to_string();

        if record.loaded_translation_mut(&rel_name, language).is_none() {
            let resolution = self.get_translated_model(record, &rel_name, language, false)?;
            if !resolution.is_found() {
                record.cache_translation(&rel_name, TranslationVariant::new(record.id(), language.clone()));
            }
        }

        if let Some(variant) = record.loaded_translation_mut(&rel_name, language) {
            variant.set(field, value);
        }
        record.mark_modified(&rel_name, language.clone());
        Ok(())
    }

    /// Clear translated `field` in `language`. Never falls back.
    pub fn delete_translated_field(
        &self,
        record: &mut TranslatableRecord,
        field: &str,
        language: &LanguageCode,
    ) -> ParlanceResult<()> {
        let (rel_name, entity) = {
            let extension = record.meta().extension_for_field(field)?;
            (
                extension.rel_name().to_string(),
                extension.translation_entity().to_string(),
            )
        };

        if !self
            .get_translated_model(record, &rel_name, language, false)?
            .is_found()
        {
            return Err(ParlanceError::Storage(StorageError::TranslationNotFound {
                entity,
                id: record.id(),
                language: language.clone(),
            }));
        }

        if let Some(variant) = record.loaded_translation_mut(&rel_name, language) {
            variant.remove(field);
        }
        record.mark_modified(&rel_name, language.clone());
        Ok(())
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Save every locally modified variant of `record`.
    ///
    /// Each saved variant is written through to the external cache, which
    /// replaces any fallback marker for its language. Returns the number of
    /// variants saved. On failure the unsaved languages stay modified.
    pub fn save_translations(&self, record: &mut TranslatableRecord) -> ParlanceResult<usize> {
        let config = self.current_config()?;
        let extensions: Vec<(String, String)> = record
            .meta()
            .extensions()
            .iter()
            .map(|ext| (ext.rel_name().to_string(), ext.translation_entity().to_string()))
            .collect();

        let mut saved = 0;
        for (rel_name, entity) in extensions {
            let pending: Vec<LanguageCode> = record.take_modified(&rel_name).into_iter().collect();
            for (index, language) in pending.iter().enumerate() {
                let Some(variant) = record
                    .local_translation(&rel_name, language)
                    .and_then(LocalTranslation::as_loaded)
                    .cloned()
                else {
                    continue;
                };

                if let Err(e) = self.save_variant(&config, &entity, &variant) {
                    for unsaved in &pending[index..] {
                        record.mark_modified(&rel_name, unsaved.clone());
                    }
                    return Err(e);
                }
                saved += 1;
            }
        }

        if saved > 0 {
            debug!(record_id = %record.id(), saved, "saved translations");
        }
        Ok(saved)
    }

    fn save_variant(
        &self,
        config: &TranslationConfig,
        entity: &str,
        variant: &TranslationVariant,
    ) -> ParlanceResult<()> {
        self.storage.translation_upsert(entity, variant)?;
        if config.caching_enabled {
            self.cache.put_translation(config, entity, variant)?;
        }
        Ok(())
    }

    /// Delete the variant of `record` in `language` from the store and both
    /// caches. Returns whether the store held one.
    pub fn delete_translation(
        &self,
        record: &mut TranslatableRecord,
        rel_name: &str,
        language: &LanguageCode,
    ) -> ParlanceResult<bool> {
        let config = self.current_config()?;
        let entity = record
            .meta()
            .extension(rel_name)?
            .translation_entity()
            .to_string();

        let deleted = self.storage.translation_delete(&entity, record.id(), language)?;
        record.forget_translation(rel_name, language);
        if config.caching_enabled {
            let key = self.cache.key(&config, &entity, record.id(), language);
            self.cache.delete(&key)?;
        }
        debug!(record_id = %record.id(), %language, deleted, "deleted translation");
        Ok(deleted)
    }

    /// Languages with a saved variant, sorted.
    ///
    /// A prefetched relation without local changes is answered without a
    /// round-trip. `include_unsaved` adds languages modified on this
    /// instance.
    pub fn get_available_languages(
        &self,
        record: &TranslatableRecord,
        rel_name: &str,
        include_unsaved: bool,
    ) -> ParlanceResult<Vec<LanguageCode>> {
        let entity = record.meta().extension(rel_name)?.translation_entity();
        let loaded = record.loaded_languages(rel_name);
        let has_unsaved = loaded
            .iter()
            .any(|language| record.is_modified(rel_name, language));

        let mut languages = if record.is_prefetched(rel_name) && !has_unsaved {
            loaded.clone()
        } else {
            self.storage.translation_languages(entity, record.id())?
        };

        if include_unsaved {
            for language in loaded {
                if record.is_modified(rel_name, &language) && !languages.contains(&language) {
                    languages.push(language);
                }
            }
            languages.sort();
        }
        Ok(languages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCacheStore;
    use crate::InMemoryTranslationStorage;
    use chrono::Utc;
    use parlance_core::{ConfigError, TranslatableModelMeta, TranslationExtension};

    const MODEL: &str = "testapp.SimpleModel";
    const ENTITY: &str = "testapp.SimpleModelTranslation";

    type TestResolver = TranslationResolver<InMemoryTranslationStorage, InMemoryCacheStore>;

    fn lang(code: &str) -> LanguageCode {
        LanguageCode::new(code).expect("valid language code")
    }

    fn make_meta() -> Arc<TranslatableModelMeta> {
        Arc::new(
            TranslatableModelMeta::new(
                MODEL,
                TranslationExtension::new("translations", ENTITY)
                    .with_field("tr_title")
                    .with_any_language_field("slug"),
            )
            .expect("valid meta"),
        )
    }

    fn make_resolver(config: TranslationConfig) -> (TestResolver, Arc<InMemoryTranslationStorage>, Arc<InMemoryCacheStore>) {
        let storage = Arc::new(InMemoryTranslationStorage::new());
        let store = Arc::new(InMemoryCacheStore::new());
        let resolver = TranslationResolver::new(
            Arc::clone(&storage),
            Arc::clone(&store),
            SettingsHandle::new(config),
        );
        (resolver, storage, store)
    }

    fn make_record(storage: &InMemoryTranslationStorage, translations: &[(&str, &str)]) -> TranslatableRecord {
        let row = storage.record_insert(MODEL, Utc::now(), &[]).expect("insert");
        for (code, title) in translations {
            storage
                .translation_upsert(
                    ENTITY,
                    &TranslationVariant::new(row.id, lang(code))
                        .with_field("tr_title", *title)
                        .with_field("slug", title.to_lowercase()),
                )
                .expect("upsert");
        }
        storage.reset_query_count();
        TranslatableRecord::new(row, make_meta())
    }

    fn fresh_instance(record: &TranslatableRecord) -> TranslatableRecord {
        TranslatableRecord::new(record.row(), record.meta_arc())
    }

    #[test]
    fn test_store_hit_then_object_cache() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default().with_caching(false));
        let mut record = make_record(&storage, &[("en", "Mexico")]);

        let first = resolver
            .get_translated_model(&mut record, "translations", &lang("en"), true)
            .expect("resolve");
        assert_eq!(first.source(), Some(ResolutionSource::BackingStore));
        assert_eq!(storage.query_count(), 1);

        let second = resolver
            .get_translated_model(&mut record, "translations", &lang("en"), true)
            .expect("resolve");
        assert_eq!(second.source(), Some(ResolutionSource::ObjectCache));
        assert_eq!(storage.query_count(), 1);
    }

    #[test]
    fn test_external_cache_serves_other_instances() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        resolver
            .get_translated_field(&mut record, "tr_title", &lang("en"))
            .expect("resolve");

        let mut other = fresh_instance(&record);
        let resolution = resolver
            .get_translated_model(&mut other, "translations", &lang("en"), true)
            .expect("resolve");
        assert_eq!(resolution.source(), Some(ResolutionSource::ExternalCache));
        assert_eq!(storage.query_count(), 1);
    }

    #[test]
    fn test_fallback_after_store_miss() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default().with_caching(false));
        let mut record = make_record(&storage, &[("en", "Mexico")]);

        let resolution = resolver
            .get_translated_model(&mut record, "translations", &lang("nl"), true)
            .expect("resolve");
        assert!(resolution.is_fallback());
        assert_eq!(
            resolution.variant().and_then(|v| v.get("tr_title")),
            Some("Mexico")
        );
        // nl miss + en hit
        assert_eq!(storage.query_count(), 2);

        resolver
            .get_translated_model(&mut record, "translations", &lang("nl"), true)
            .expect("resolve");
        assert_eq!(storage.query_count(), 2);
    }

    #[test]
    fn test_no_fallback_is_unavailable() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        let resolution = resolver
            .get_translated_model(&mut record, "translations", &lang("nl"), false)
            .expect("resolve");
        assert_eq!(resolution, Resolution::Unavailable);
    }

    #[test]
    fn test_exhausted_chain_is_not_an_error() {
        let (resolver, storage, _) = make_resolver(
            TranslationConfig::default().with_fallbacks(vec![lang("de"), lang("fr")]),
        );
        let mut record = make_record(&storage, &[]);
        let value = resolver
            .get_translated_field(&mut record, "tr_title", &lang("nl"))
            .expect("resolve");
        assert_eq!(value, None);
        // nl, de, fr
        assert_eq!(storage.query_count(), 3);
    }

    #[test]
    fn test_fallback_writes_marker() {
        let (resolver, storage, store) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        resolver
            .get_translated_field(&mut record, "tr_title", &lang("nl"))
            .expect("resolve");

        let key = resolver
            .translation_cache_key(&record, "translations", &lang("nl"))
            .expect("key");
        let bytes = store.get(&key).expect("get").expect("marker stored");
        assert!(CacheEntry::decode(&bytes).expect("decode").is_needs_fallback());
    }

    #[test]
    fn test_marker_rechecks_store_before_cached_fallback() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        resolver
            .get_translated_field(&mut record, "tr_title", &lang("nl"))
            .expect("resolve");
        storage.reset_query_count();

        // nl store miss, en from the external cache.
        let mut other = fresh_instance(&record);
        let resolution = resolver
            .get_translated_model(&mut other, "translations", &lang("nl"), true)
            .expect("resolve");
        assert!(resolution.is_fallback());
        assert_eq!(resolution.source(), Some(ResolutionSource::ExternalCache));
        assert_eq!(storage.query_count(), 1);
    }

    #[test]
    fn test_marker_does_not_hide_later_translation() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        resolver
            .get_translated_field(&mut record, "tr_title", &lang("nl"))
            .expect("resolve");

        // Written behind the resolver's back, so the marker stays in place.
        storage
            .translation_upsert(
                ENTITY,
                &TranslationVariant::new(record.id(), lang("nl")).with_field("tr_title", "Mexico-NL"),
            )
            .expect("upsert");

        let mut other = fresh_instance(&record);
        let resolution = resolver
            .get_translated_model(&mut other, "translations", &lang("nl"), true)
            .expect("resolve");
        assert!(!resolution.is_fallback());
        assert_eq!(resolution.source(), Some(ResolutionSource::BackingStore));
        assert_eq!(
            resolution.variant().and_then(|v| v.get("tr_title")),
            Some("Mexico-NL")
        );
    }

    #[test]
    fn test_marker_is_not_a_negative_cache() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        resolver
            .cache_translation_needs_fallback(&record, &lang("en"), "translations")
            .expect("mark");

        let value = resolver
            .get_translated_field(&mut record, "tr_title", &lang("en"))
            .expect("resolve");
        assert_eq!(value.as_deref(), Some("Mexico"));
        assert_eq!(storage.query_count(), 1);
    }

    #[test]
    fn test_any_language_field() {
        let (resolver, storage, _) = make_resolver(
            TranslationConfig::default().with_fallbacks(vec![lang("en")]),
        );
        let mut record = make_record(&storage, &[("de", "Mexiko")]);

        assert_eq!(
            resolver
                .get_translated_field(&mut record, "tr_title", &lang("nl"))
                .expect("resolve"),
            None
        );
        assert_eq!(
            resolver
                .get_translated_field(&mut record, "slug", &lang("nl"))
                .expect("resolve")
                .as_deref(),
            Some("mexiko")
        );
    }

    #[test]
    fn test_safe_translation_getter_default() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[]);
        let value = resolver
            .safe_translation_getter(&mut record, "tr_title", &lang("en"), "(untitled)")
            .expect("resolve");
        assert_eq!(value, "(untitled)");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[]);
        assert!(resolver
            .get_translated_field(&mut record, "nope", &lang("en"))
            .is_err());
        assert_eq!(storage.query_count(), 0);
    }

    #[test]
    fn test_set_and_save_overwrites_marker() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        resolver
            .cache_translation_needs_fallback(&record, &lang("nl"), "translations")
            .expect("mark");

        resolver
            .set_translated_field(&mut record, "tr_title", "Mexico (nl)", &lang("nl"))
            .expect("set");
        assert_eq!(resolver.save_translations(&mut record).expect("save"), 1);

        let mut other = fresh_instance(&record);
        storage.reset_query_count();
        let resolution = resolver
            .get_translated_model(&mut other, "translations", &lang("nl"), true)
            .expect("resolve");
        assert!(!resolution.is_fallback());
        assert_eq!(resolution.source(), Some(ResolutionSource::ExternalCache));
        assert_eq!(storage.query_count(), 0);
    }

    #[test]
    fn test_save_failure_keeps_changes() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[]);
        resolver
            .set_translated_field(&mut record, "tr_title", "Norway", &lang("en"))
            .expect("set");

        storage.set_unavailable(true);
        assert!(resolver.save_translations(&mut record).is_err());
        assert!(record.is_modified("translations", &lang("en")));

        storage.set_unavailable(false);
        assert_eq!(resolver.save_translations(&mut record).expect("save"), 1);
    }

    #[test]
    fn test_delete_translated_field() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        resolver
            .delete_translated_field(&mut record, "tr_title", &lang("en"))
            .expect("delete");
        assert_eq!(
            resolver
                .get_translated_field(&mut record, "tr_title", &lang("en"))
                .expect("resolve"),
            None
        );

        let err = resolver
            .delete_translated_field(&mut record, "tr_title", &lang("fr"))
            .expect_err("no fr variant");
        assert!(matches!(
            err,
            ParlanceError::Storage(StorageError::TranslationNotFound { .. })
        ));
    }

    #[test]
    fn test_delete_translation_clears_caches() {
        let (resolver, storage, store) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico"), ("nl", "Mexico")]);
        resolver
            .get_translated_field(&mut record, "tr_title", &lang("nl"))
            .expect("resolve");
        assert_eq!(store.len(), 1);

        assert!(resolver
            .delete_translation(&mut record, "translations", &lang("nl"))
            .expect("delete"));
        assert!(store.is_empty());
        assert_eq!(
            resolver
                .get_available_languages(&record, "translations", false)
                .expect("languages"),
            vec![lang("en")]
        );
    }

    #[test]
    fn test_available_languages_include_unsaved() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        resolver
            .set_translated_field(&mut record, "tr_title", "Mexique", &lang("fr"))
            .expect("set");
        assert_eq!(
            resolver
                .get_available_languages(&record, "translations", true)
                .expect("languages"),
            vec![lang("en"), lang("fr")]
        );
        assert_eq!(
            resolver
                .get_available_languages(&record, "translations", false)
                .expect("languages"),
            vec![lang("en")]
        );
    }

    #[test]
    fn test_store_failure_propagates() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        storage.set_unavailable(true);
        let err = resolver
            .get_translated_field(&mut record, "tr_title", &lang("en"))
            .expect_err("store down");
        assert!(matches!(
            err,
            ParlanceError::Storage(StorageError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_translation_cache_key_follows_settings() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let record = make_record(&storage, &[]);
        let _guard = resolver
            .settings()
            .override_settings(|c| c.cache_key_prefix = "mysite".to_string());
        assert_eq!(
            resolver
                .translation_cache_key(&record, "translations", &lang("en"))
                .expect("key"),
            format!("mysite.{ENTITY}.{}.en", record.id())
        );
    }

    #[test]
    fn test_invalid_prefix_rejected_at_use() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico")]);
        let _guard = resolver
            .settings()
            .override_settings(|c| c.cache_key_prefix = "mysite.".to_string());

        let err = resolver
            .translation_cache_key(&record, "translations", &lang("en"))
            .expect_err("trailing separator");
        assert!(matches!(err, ParlanceError::Config(ConfigError::InvalidValue { .. })));
        assert!(resolver
            .get_translated_field(&mut record, "tr_title", &lang("en"))
            .is_err());
        assert_eq!(storage.query_count(), 0);
    }

    #[test]
    fn test_current_language_field() {
        let (resolver, storage, _) = make_resolver(TranslationConfig::default());
        let mut record = make_record(&storage, &[("en", "Mexico"), ("nl", "Mexico (nl)")]);
        assert_eq!(
            resolver
                .get_current_translated_field(&mut record, "tr_title")
                .expect("resolve")
                .as_deref(),
            Some("Mexico")
        );

        record.set_current_language(Some(lang("nl")));
        assert_eq!(
            resolver
                .get_current_translated_field(&mut record, "tr_title")
                .expect("resolve")
                .as_deref(),
            Some("Mexico (nl)")
        );
    }
}
