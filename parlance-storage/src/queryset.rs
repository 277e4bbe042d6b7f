//! Record retrieval for translatable models.
//!
//! A [`QuerySet`] evaluates at most once: its records, with their
//! object-local caches, are kept, so iterating it again issues no
//! round-trip.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Utc};
use parlance_core::{
    LanguageCode, ParlanceError, ParlanceResult, RecordId, StorageError, Timestamp,
    TranslatableModelMeta, TranslatableRecord, TranslationVariant,
};
use tracing::{debug, warn};

use crate::cache::TranslationCacheStore;
use crate::prefetch::PrefetchCoordinator;
use crate::resolver::TranslationResolver;
use crate::TranslationStorage;

/// Entry point for loading and creating records of one translatable model.
pub struct TranslatableManager<S, C>
where
    S: TranslationStorage,
    C: TranslationCacheStore,
{
    resolver: Arc<TranslationResolver<S, C>>,
    meta: Arc<TranslatableModelMeta>,
}

impl<S, C> TranslatableManager<S, C>
where
    S: TranslationStorage,
    C: TranslationCacheStore,
{
    pub fn new(resolver: Arc<TranslationResolver<S, C>>, meta: Arc<TranslatableModelMeta>) -> Self {
        Self { resolver, meta }
    }

    pub fn meta(&self) -> &TranslatableModelMeta {
        &self.meta
    }

    pub fn resolver(&self) -> &TranslationResolver<S, C> {
        &self.resolver
    }

    /// Unevaluated query over every record of the model.
    pub fn all(&self) -> QuerySet<S> {
        QuerySet::new(self.resolver.storage_arc(), Arc::clone(&self.meta))
    }

    /// Unevaluated query whose records read fields in `language` by default.
    pub fn language(&self, language: LanguageCode) -> QuerySet<S> {
        self.all().language(language)
    }

    /// First record in id order. One round-trip.
    pub fn first(&self) -> ParlanceResult<Option<TranslatableRecord>> {
        Ok(self
            .resolver
            .storage()
            .record_first(self.meta.model_name())?
            .map(|row| TranslatableRecord::new(row, Arc::clone(&self.meta))))
    }

    /// Record with `id`. One round-trip.
    pub fn get(&self, id: RecordId) -> ParlanceResult<TranslatableRecord> {
        self.resolver
            .storage()
            .record_get(self.meta.model_name(), id)?
            .map(|row| TranslatableRecord::new(row, Arc::clone(&self.meta)))
            .ok_or_else(|| {
                ParlanceError::Storage(StorageError::NotFound {
                    entity: self.meta.model_name().to_string(),
                    id,
                })
            })
    }

    /// Create a record with translated `fields` in `language` and save it.
    ///
    /// Fields may belong to several translation relations; one variant is
    /// saved per relation touched.
    pub fn create(
        &self,
        language: &LanguageCode,
        fields: &[(&str, &str)],
    ) -> ParlanceResult<TranslatableRecord> {
        self.create_with_datetimes(language, fields, &[])
    }

    /// [`Self::create`] with values for untranslated datetime columns.
    ///
    /// When saving the translations fails the base row is deleted again,
    /// so no record is left without its variants.
    pub fn create_with_datetimes(
        &self,
        language: &LanguageCode,
        fields: &[(&str, &str)],
        datetimes: &[(&str, Timestamp)],
    ) -> ParlanceResult<TranslatableRecord> {
        // Reject unknown fields before writing anything.
        let mut assignments = Vec::with_capacity(fields.len());
        for (field, value) in fields {
            let rel_name = self.meta.extension_for_field(field)?.rel_name().to_string();
            assignments.push((rel_name, *field, *value));
        }
        for (field, _) in datetimes {
            self.meta.require_datetime_field(field)?;
        }

        let storage = self.resolver.storage();
        let row = storage.record_insert(self.meta.model_name(), Utc::now(), datetimes)?;
        let mut record = TranslatableRecord::new(row, Arc::clone(&self.meta));

        for (rel_name, field, value) in assignments {
            if record.loaded_translation_mut(&rel_name, language).is_none() {
                record.cache_translation(
                    &rel_name,
                    TranslationVariant::new(record.id(), language.clone()),
                );
            }
            if let Some(variant) = record.loaded_translation_mut(&rel_name, language) {
                variant.set(field, value);
            }
            record.mark_modified(&rel_name, language.clone());
        }

        if let Err(e) = self.resolver.save_translations(&mut record) {
            if let Err(cleanup) = storage.record_delete(self.meta.model_name(), record.id()) {
                warn!(
                    model = self.meta.model_name(),
                    id = %record.id(),
                    error = %cleanup,
                    "failed to remove record after failed create"
                );
            }
            return Err(e);
        }
        debug!(model = self.meta.model_name(), id = %record.id(), %language, "created record");
        Ok(record)
    }
}

/// Truncation applied by [`QuerySet::dates`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateKind {
    Year,
    Month,
    Day,
}

impl DateKind {
    fn truncate(self, at: Timestamp) -> Option<NaiveDate> {
        let date = at.date_naive();
        match self {
            Self::Year => NaiveDate::from_ymd_opt(date.year(), 1, 1),
            Self::Month => NaiveDate::from_ymd_opt(date.year(), date.month(), 1),
            Self::Day => Some(date),
        }
    }
}

/// Lazily evaluated list of records.
pub struct QuerySet<S: TranslationStorage> {
    storage: Arc<S>,
    meta: Arc<TranslatableModelMeta>,
    prefetch: Vec<String>,
    language: Option<LanguageCode>,
    result_cache: Option<Vec<TranslatableRecord>>,
}

impl<S: TranslationStorage> QuerySet<S> {
    fn new(storage: Arc<S>, meta: Arc<TranslatableModelMeta>) -> Self {
        Self {
            storage,
            meta,
            prefetch: Vec::new(),
            language: None,
            result_cache: None,
        }
    }

    /// Read fields of the returned records in `language` by default.
    pub fn language(mut self, language: LanguageCode) -> Self {
        if let Some(records) = self.result_cache.as_mut() {
            for record in records.iter_mut() {
                record.set_current_language(Some(language.clone()));
            }
        }
        self.language = Some(language);
        self
    }

    /// Bulk-load translation relation `rel_name` on evaluation.
    pub fn prefetch_related(mut self, rel_name: &str) -> ParlanceResult<Self> {
        self.meta.extension(rel_name)?;
        if !self.prefetch.iter().any(|r| r == rel_name) {
            self.prefetch.push(rel_name.to_string());
        }
        // A new lookup invalidates earlier results.
        self.result_cache = None;
        Ok(self)
    }

    pub fn is_evaluated(&self) -> bool {
        self.result_cache.is_some()
    }

    /// Evaluate once and return the records.
    ///
    /// Costs one round-trip for the records plus one per prefetched
    /// relation on first call, nothing afterwards.
    pub fn evaluate(&mut self) -> ParlanceResult<&mut [TranslatableRecord]> {
        if self.result_cache.is_none() {
            let rows = self.storage.record_list(self.meta.model_name())?;
            let mut records: Vec<TranslatableRecord> = rows
                .into_iter()
                .map(|row| {
                    let mut record = TranslatableRecord::new(row, Arc::clone(&self.meta));
                    record.set_current_language(self.language.clone());
                    record
                })
                .collect();

            let coordinator = PrefetchCoordinator::new(self.storage.as_ref());
            for rel_name in &self.prefetch {
                coordinator.prefetch(&mut records, rel_name)?;
            }
            self.result_cache = Some(records);
        }
        Ok(self.result_cache.get_or_insert_with(Vec::new).as_mut_slice())
    }

    /// Record at `index`, evaluating if needed.
    ///
    /// Repeated calls return the same instance, object-local cache included.
    pub fn get(&mut self, index: usize) -> ParlanceResult<Option<&mut TranslatableRecord>> {
        Ok(self.evaluate()?.get_mut(index))
    }

    pub fn first(&mut self) -> ParlanceResult<Option<&mut TranslatableRecord>> {
        self.get(0)
    }

    /// Distinct dates of datetime column `field`, truncated to `kind`, ascending.
    ///
    /// Answered from the evaluated records when there are any, otherwise
    /// with one round-trip that leaves this queryset unevaluated.
    pub fn dates(&self, field: &str, kind: DateKind) -> ParlanceResult<Vec<NaiveDate>> {
        self.meta.require_datetime_field(field)?;
        let values: Vec<Timestamp> = match &self.result_cache {
            Some(records) => records.iter().filter_map(|r| r.datetime(field)).collect(),
            None => self
                .storage
                .record_list(self.meta.model_name())?
                .into_iter()
                .filter_map(|row| row.datetimes.get(field).copied())
                .collect(),
        };
        let dates: BTreeSet<NaiveDate> = values
            .into_iter()
            .filter_map(|at| kind.truncate(at))
            .collect();
        Ok(dates.into_iter().collect())
    }

    /// Number of records, evaluating if needed.
    pub fn len(&mut self) -> ParlanceResult<usize> {
        Ok(self.evaluate()?.len())
    }

    pub fn is_empty(&mut self) -> ParlanceResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Evaluate and take ownership of the records.
    pub fn into_records(mut self) -> ParlanceResult<Vec<TranslatableRecord>> {
        self.evaluate()?;
        Ok(self.result_cache.unwrap_or_default())
    }
}
