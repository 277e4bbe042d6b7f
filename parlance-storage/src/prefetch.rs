//! Bulk loading of translations for a batch of records.

use std::collections::HashMap;

use parlance_core::{ParlanceResult, RecordId, TranslatableRecord, TranslationVariant};
use tracing::debug;

use crate::TranslationStorage;

/// Loads every variant of a translation relation for many records in one
/// backing-store round-trip.
///
/// After a prefetch each record's object-local cache is authoritative for
/// the relation: a language absent from it is known to be missing and
/// resolving it costs no round-trip. Prefetched variants are not written to
/// the external cache.
pub struct PrefetchCoordinator<'a, S: TranslationStorage> {
    storage: &'a S,
}

impl<'a, S: TranslationStorage> PrefetchCoordinator<'a, S> {
    pub fn new(storage: &'a S) -> Self {
        Self { storage }
    }

    /// Prefetch relation `rel_name` for `records`.
    ///
    /// An empty batch issues no query. Variants modified locally and not
    /// yet saved are kept. Returns the number of variants loaded.
    pub fn prefetch(&self, records: &mut [TranslatableRecord], rel_name: &str) -> ParlanceResult<usize> {
        let Some(first) = records.first() else {
            return Ok(0);
        };
        let entity = first
            .meta()
            .extension(rel_name)?
            .translation_entity()
            .to_string();

        let ids: Vec<RecordId> = records.iter().map(TranslatableRecord::id).collect();
        let variants = self.storage.translation_list_for_records(&entity, &ids)?;
        let loaded = variants.len();

        let mut by_record: HashMap<RecordId, Vec<TranslationVariant>> = HashMap::new();
        for variant in variants {
            by_record.entry(variant.record_id).or_default().push(variant);
        }

        for record in records.iter_mut() {
            for variant in by_record.remove(&record.id()).unwrap_or_default() {
                if !record.is_modified(rel_name, &variant.language_code) {
                    record.cache_translation(rel_name, variant);
                }
            }
            record.mark_prefetched(rel_name);
        }

        debug!(
            entity = %entity,
            records = records.len(),
            variants = loaded,
            "prefetched translations"
        );
        Ok(loaded)
    }
}
