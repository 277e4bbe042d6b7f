//! Parlance Storage - Backing Store, Caches and Resolution
//!
//! Defines the backing store abstraction for translatable records and their
//! translation tables, the external translation cache, and the components
//! that resolve translated fields through the three cache layers:
//! object-local cache, external cache, backing store.

pub mod cache;
pub mod prefetch;
pub mod queryset;
pub mod resolver;

pub use cache::{
    cache_translation_needs_fallback, get_translation_cache_key, CacheEntry, CacheStats,
    InMemoryCacheStore, LmdbCacheError, LmdbCacheStore, TranslationCache, TranslationCacheKey,
    TranslationCacheStore,
};
pub use prefetch::PrefetchCoordinator;
pub use queryset::{DateKind, QuerySet, TranslatableManager};
pub use resolver::{Resolution, ResolutionSource, TranslationResolver};

use parlance_core::{
    LanguageCode, ParlanceError, ParlanceResult, RecordId, RecordRow, StorageError, Timestamp,
    TranslationVariant,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tracing::trace;

// ============================================================================
// STORAGE TRAIT
// ============================================================================

/// Backing store for translatable records and their translation tables.
///
/// Every method is one round-trip. Record tables are addressed by model
/// name, translation tables by translation entity name; at most one
/// variant exists per (record, language) in a translation table.
pub trait TranslationStorage: Send + Sync {
    // === Record Operations ===

    /// Insert a new record row with its datetime columns, assigning its id.
    fn record_insert(
        &self,
        model: &str,
        created_at: Timestamp,
        datetimes: &[(&str, Timestamp)],
    ) -> ParlanceResult<RecordRow>;

    /// Delete a record row. Returns whether one existed.
    fn record_delete(&self, model: &str, id: RecordId) -> ParlanceResult<bool>;

    /// Get a record row by id.
    fn record_get(&self, model: &str, id: RecordId) -> ParlanceResult<Option<RecordRow>>;

    /// First record row in id order.
    fn record_first(&self, model: &str) -> ParlanceResult<Option<RecordRow>>;

    /// All record rows in id order.
    fn record_list(&self, model: &str) -> ParlanceResult<Vec<RecordRow>>;

    // === Translation Operations ===

    /// Get the variant of one record in one language.
    fn translation_get(
        &self,
        entity: &str,
        record_id: RecordId,
        language: &LanguageCode,
    ) -> ParlanceResult<Option<TranslationVariant>>;

    /// Any variant of one record, lowest language code first.
    fn translation_first(
        &self,
        entity: &str,
        record_id: RecordId,
    ) -> ParlanceResult<Option<TranslationVariant>>;

    /// Every variant of every given record, in one batch.
    fn translation_list_for_records(
        &self,
        entity: &str,
        record_ids: &[RecordId],
    ) -> ParlanceResult<Vec<TranslationVariant>>;

    /// Languages with a stored variant for one record, sorted.
    fn translation_languages(
        &self,
        entity: &str,
        record_id: RecordId,
    ) -> ParlanceResult<Vec<LanguageCode>>;

    /// Insert or replace a variant.
    fn translation_upsert(&self, entity: &str, variant: &TranslationVariant)
        -> ParlanceResult<()>;

    /// Delete a variant. Returns whether one existed.
    fn translation_delete(
        &self,
        entity: &str,
        record_id: RecordId,
        language: &LanguageCode,
    ) -> ParlanceResult<bool>;

    // === Instrumentation ===

    /// Round-trips issued so far.
    fn query_count(&self) -> u64;
}

// ============================================================================
// IN-MEMORY STORAGE
// ============================================================================

type TranslationTable = BTreeMap<(RecordId, LanguageCode), TranslationVariant>;

/// In-memory backing store with round-trip counting.
///
/// Every trait call counts as one round-trip, failed ones included. The
/// store can be switched unavailable to exercise error propagation.
#[derive(Debug, Default)]
pub struct InMemoryTranslationStorage {
    records: Arc<RwLock<BTreeMap<String, BTreeMap<RecordId, RecordRow>>>>,
    translations: Arc<RwLock<BTreeMap<String, TranslationTable>>>,
    sequences: Arc<RwLock<BTreeMap<String, u64>>>,
    queries: AtomicU64,
    unavailable: AtomicBool,
    failing_operation: RwLock<Option<String>>,
}

fn poisoned<T>(_: T) -> ParlanceError {
    ParlanceError::Storage(StorageError::LockPoisoned)
}

impl InMemoryTranslationStorage {
    /// Create an empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data. Does not count as a round-trip.
    pub fn clear(&self) {
        if let Ok(mut records) = self.records.write() {
            records.clear();
        }
        if let Ok(mut translations) = self.translations.write() {
            translations.clear();
        }
        if let Ok(mut sequences) = self.sequences.write() {
            sequences.clear();
        }
    }

    /// Reset the round-trip counter to zero.
    pub fn reset_query_count(&self) {
        self.queries.store(0, Ordering::SeqCst);
    }

    /// Make every following call fail with [`StorageError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Make every following call of one named operation fail with
    /// [`StorageError::Unavailable`], or stop doing so with `None`.
    pub fn set_failing_operation(&self, operation: Option<&str>) {
        if let Ok(mut failing) = self.failing_operation.write() {
            *failing = operation.map(str::to_string);
        }
    }

    /// Get count of stored records of `model`.
    pub fn record_count(&self, model: &str) -> usize {
        self.records
            .read()
            .map(|r| r.get(model).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Get count of stored variants of `entity`.
    pub fn translation_count(&self, entity: &str) -> usize {
        self.translations
            .read()
            .map(|t| t.get(entity).map(BTreeMap::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Count one round-trip and fail if the store is unavailable.
    fn round_trip(&self, operation: &'static str) -> ParlanceResult<()> {
        let n = self.queries.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(operation, round_trip = n, "backing store query");
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ParlanceError::Storage(StorageError::Unavailable {
                reason: format!("{operation}: store switched off"),
            }));
        }
        let failing = self.failing_operation.read().map_err(poisoned)?;
        if failing.as_deref() == Some(operation) {
            return Err(ParlanceError::Storage(StorageError::Unavailable {
                reason: format!("{operation}: operation switched off"),
            }));
        }
        Ok(())
    }
}

impl TranslationStorage for InMemoryTranslationStorage {
    // === Record Operations ===

    fn record_insert(
        &self,
        model: &str,
        created_at: Timestamp,
        datetimes: &[(&str, Timestamp)],
    ) -> ParlanceResult<RecordRow> {
        self.round_trip("record_insert")?;
        let mut sequences = self.sequences.write().map_err(poisoned)?;
        let mut records = self.records.write().map_err(poisoned)?;

        let next = sequences.entry(model.to_string()).or_insert(0);
        *next += 1;
        let id = RecordId::new(*next);

        let table = records.entry(model.to_string()).or_default();
        if table.contains_key(&id) {
            return Err(ParlanceError::Storage(StorageError::InsertFailed {
                entity: model.to_string(),
                reason: "already exists".to_string(),
            }));
        }
        let row = datetimes
            .iter()
            .fold(RecordRow::new(id, created_at), |row, (field, value)| {
                row.with_datetime(*field, *value)
            });
        table.insert(id, row.clone());
        Ok(row)
    }

    fn record_delete(&self, model: &str, id: RecordId) -> ParlanceResult<bool> {
        self.round_trip("record_delete")?;
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records
            .get_mut(model)
            .map(|t| t.remove(&id).is_some())
            .unwrap_or(false))
    }

    fn record_get(&self, model: &str, id: RecordId) -> ParlanceResult<Option<RecordRow>> {
        self.round_trip("record_get")?;
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(model).and_then(|t| t.get(&id)).cloned())
    }

    fn record_first(&self, model: &str) -> ParlanceResult<Option<RecordRow>> {
        self.round_trip("record_first")?;
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .get(model)
            .and_then(|t| t.values().next())
            .cloned())
    }

    fn record_list(&self, model: &str) -> ParlanceResult<Vec<RecordRow>> {
        self.round_trip("record_list")?;
        let records = self.records.read().map_err(poisoned)?;
        Ok(records
            .get(model)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    // === Translation Operations ===

    fn translation_get(
        &self,
        entity: &str,
        record_id: RecordId,
        language: &LanguageCode,
    ) -> ParlanceResult<Option<TranslationVariant>> {
        self.round_trip("translation_get")?;
        let translations = self.translations.read().map_err(poisoned)?;
        Ok(translations
            .get(entity)
            .and_then(|t| t.get(&(record_id, language.clone())))
            .cloned())
    }

    fn translation_first(
        &self,
        entity: &str,
        record_id: RecordId,
    ) -> ParlanceResult<Option<TranslationVariant>> {
        self.round_trip("translation_first")?;
        let translations = self.translations.read().map_err(poisoned)?;
        Ok(translations.get(entity).and_then(|t| {
            t.values()
                .find(|variant| variant.record_id == record_id)
                .cloned()
        }))
    }

    fn translation_list_for_records(
        &self,
        entity: &str,
        record_ids: &[RecordId],
    ) -> ParlanceResult<Vec<TranslationVariant>> {
        self.round_trip("translation_list_for_records")?;
        let translations = self.translations.read().map_err(poisoned)?;
        Ok(translations
            .get(entity)
            .map(|t| {
                t.values()
                    .filter(|variant| record_ids.contains(&variant.record_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn translation_languages(
        &self,
        entity: &str,
        record_id: RecordId,
    ) -> ParlanceResult<Vec<LanguageCode>> {
        self.round_trip("translation_languages")?;
        let translations = self.translations.read().map_err(poisoned)?;
        Ok(translations
            .get(entity)
            .map(|t| {
                t.keys()
                    .filter(|(id, _)| *id == record_id)
                    .map(|(_, language)| language.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    fn translation_upsert(
        &self,
        entity: &str,
        variant: &TranslationVariant,
    ) -> ParlanceResult<()> {
        self.round_trip("translation_upsert")?;
        let mut translations = self.translations.write().map_err(poisoned)?;
        translations.entry(entity.to_string()).or_default().insert(
            (variant.record_id, variant.language_code.clone()),
            variant.clone(),
        );
        Ok(())
    }

    fn translation_delete(
        &self,
        entity: &str,
        record_id: RecordId,
        language: &LanguageCode,
    ) -> ParlanceResult<bool> {
        self.round_trip("translation_delete")?;
        let mut translations = self.translations.write().map_err(poisoned)?;
        Ok(translations
            .get_mut(entity)
            .map(|t| t.remove(&(record_id, language.clone())).is_some())
            .unwrap_or(false))
    }

    // === Instrumentation ===

    fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }
}
