//! Parlance Test Utilities
//!
//! Centralized test infrastructure for the Parlance workspace:
//! - Tracing setup for test runs
//! - Proptest generators for core types
//! - Test fixtures for common scenarios
//! - Custom assertions, including round-trip counting

// Re-export in-memory implementations from their source crate
pub use parlance_storage::{InMemoryCacheStore, InMemoryTranslationStorage};

// Re-export core types for convenience
pub use parlance_core::{
    CacheError, ConfigError, LanguageCode, ParlanceError, ParlanceResult, RecordId, RecordRow,
    SettingsHandle, StorageError, Timestamp, TranslatableModelMeta, TranslatableRecord,
    TranslationConfig, TranslationExtension, TranslationVariant, ValidationError,
};

use std::sync::Once;

use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// TRACING
// ============================================================================

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process.
///
/// Honours `RUST_LOG`; defaults to `parlance_storage=debug,warn`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("parlance_storage=debug,warn"));
        // Another harness may already own the global subscriber.
        let _ = fmt()
            .with_env_filter(env_filter)
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating Parlance types.

    use super::*;
    use proptest::prelude::*;
    use std::time::Duration;

    /// Generate a valid language code such as `en`, `pt-br` or `zh-hans`.
    pub fn arb_language_code() -> impl Strategy<Value = LanguageCode> {
        "[a-z]{2,3}([-_][a-z]{2,4})?".prop_filter_map("valid language code", |code| {
            LanguageCode::new(code).ok()
        })
    }

    /// Generate a RecordId.
    pub fn arb_record_id() -> impl Strategy<Value = RecordId> {
        (1u64..1_000_000).prop_map(RecordId::new)
    }

    /// Generate a cache key prefix, empty included.
    pub fn arb_cache_prefix() -> impl Strategy<Value = String> {
        prop_oneof![Just(String::new()), "[a-z][a-z0-9_-]{0,15}"]
    }

    /// Generate a translated field value.
    pub fn arb_field_value() -> impl Strategy<Value = String> {
        "[A-Za-z ]{0,40}"
    }

    /// Generate a variant of `record_id` with a `tr_title` field.
    pub fn arb_variant(record_id: RecordId) -> impl Strategy<Value = TranslationVariant> {
        (arb_language_code(), arb_field_value()).prop_map(move |(language, title)| {
            TranslationVariant::new(record_id, language).with_field("tr_title", title)
        })
    }

    /// Generate a valid TranslationConfig.
    pub fn arb_valid_config() -> impl Strategy<Value = TranslationConfig> {
        (
            any::<bool>(),
            arb_cache_prefix(),
            0u64..172_800,
            arb_language_code(),
            prop::collection::vec(arb_language_code(), 0..4),
        )
            .prop_map(|(caching, prefix, timeout, default_language, fallbacks)| {
                TranslationConfig::default()
                    .with_caching(caching)
                    .with_prefix(prefix)
                    .with_timeout(Duration::from_secs(timeout))
                    .with_default_language(default_language)
                    .with_fallbacks(fallbacks)
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built test fixtures for common testing scenarios.

    use super::*;
    use parlance_storage::{TranslatableManager, TranslationCacheStore, TranslationResolver};
    use std::sync::Arc;

    /// Model name of the simple fixture model.
    pub const SIMPLE_MODEL: &str = "parlance.testapp.SimpleModel";

    /// Translation entity of the simple fixture model.
    pub const SIMPLE_MODEL_TRANSLATION: &str = "parlance.testapp.SimpleModelTranslation";

    /// Model name of the fixture model with an untranslated `datetime` column.
    pub const DATETIME_MODEL: &str = "parlance.testapp.DateTimeModel";

    /// Translation entity of the datetime fixture model.
    pub const DATETIME_MODEL_TRANSLATION: &str = "parlance.testapp.DateTimeModelTranslation";

    /// Country names seeded by [`TranslationTestEnv::seed_countries`].
    pub const COUNTRY_LIST: [&str; 10] = [
        "Mexico",
        "Monaco",
        "Morocco",
        "Netherlands",
        "Norway",
        "Poland",
        "Portugal",
        "Romania",
        "Russia",
        "South Africa",
    ];

    pub type TestResolver = TranslationResolver<InMemoryTranslationStorage, InMemoryCacheStore>;
    pub type TestManager = TranslatableManager<InMemoryTranslationStorage, InMemoryCacheStore>;

    /// Parse a language code known to be valid.
    #[track_caller]
    pub fn lang(code: &str) -> LanguageCode {
        match LanguageCode::new(code) {
            Ok(language) => language,
            Err(e) => panic!("invalid fixture language code {code:?}: {e}"),
        }
    }

    /// Metadata of the simple model: relation `translations` with a single
    /// `tr_title` field.
    pub fn simple_model_meta() -> Arc<TranslatableModelMeta> {
        match TranslatableModelMeta::new(
            SIMPLE_MODEL,
            TranslationExtension::new("translations", SIMPLE_MODEL_TRANSLATION)
                .with_field("tr_title"),
        ) {
            Ok(meta) => Arc::new(meta),
            Err(e) => panic!("invalid fixture metadata: {e}"),
        }
    }

    /// Metadata of the datetime model: relation `translations` with a
    /// `tr_title` field, plus an untranslated `datetime` column.
    pub fn datetime_model_meta() -> Arc<TranslatableModelMeta> {
        match TranslatableModelMeta::new(
            DATETIME_MODEL,
            TranslationExtension::new("translations", DATETIME_MODEL_TRANSLATION)
                .with_field("tr_title"),
        )
        .and_then(|meta| meta.with_datetime_field("datetime"))
        {
            Ok(meta) => Arc::new(meta),
            Err(e) => panic!("invalid fixture metadata: {e}"),
        }
    }

    /// In-memory backing store, in-memory external cache and shared
    /// settings wired to a resolver and a manager of the simple model.
    pub struct TranslationTestEnv {
        pub storage: Arc<InMemoryTranslationStorage>,
        pub cache: Arc<InMemoryCacheStore>,
        pub settings: SettingsHandle,
        pub resolver: Arc<TestResolver>,
        pub manager: TestManager,
        pub datetime_manager: TestManager,
    }

    impl TranslationTestEnv {
        pub fn new(config: TranslationConfig) -> Self {
            Self::with_cache(config, Arc::new(InMemoryCacheStore::new()))
        }

        /// Environment sharing an existing external cache.
        pub fn with_cache(config: TranslationConfig, cache: Arc<InMemoryCacheStore>) -> Self {
            init_tracing();
            let storage = Arc::new(InMemoryTranslationStorage::new());
            let settings = SettingsHandle::new(config);
            let resolver = Arc::new(TranslationResolver::new(
                Arc::clone(&storage),
                Arc::clone(&cache),
                settings.clone(),
            ));
            let manager = TranslatableManager::new(Arc::clone(&resolver), simple_model_meta());
            let datetime_manager =
                TranslatableManager::new(Arc::clone(&resolver), datetime_model_meta());
            Self {
                storage,
                cache,
                settings,
                resolver,
                manager,
                datetime_manager,
            }
        }

        /// Create one record per country with a `tr_title` in `language`,
        /// then clear the external cache and reset the round-trip counter.
        #[track_caller]
        pub fn seed_countries(&self, language: &LanguageCode) -> Vec<RecordId> {
            self.seed_titles(language, &COUNTRY_LIST)
        }

        /// Create one simple-model record per title, then clear the external
        /// cache and reset the round-trip counter.
        #[track_caller]
        pub fn seed_titles(&self, language: &LanguageCode, titles: &[&str]) -> Vec<RecordId> {
            let ids = titles
                .iter()
                .map(|title| match self.manager.create(language, &[("tr_title", *title)]) {
                    Ok(record) => record.id(),
                    Err(e) => panic!("seeding {title} failed: {e}"),
                })
                .collect();
            self.reset();
            ids
        }

        /// Clear the external cache and reset the round-trip counter.
        #[track_caller]
        pub fn reset(&self) {
            if let Err(e) = self.cache.clear() {
                panic!("clearing the cache failed: {e}");
            }
            self.storage.reset_query_count();
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for Parlance-specific validation.

    use super::*;
    use parlance_storage::{Resolution, TranslationStorage};

    /// Run `f` and assert it issued exactly `expected` backing-store
    /// round-trips. Returns what `f` returned.
    #[track_caller]
    pub fn assert_num_queries<S, R>(storage: &S, expected: u64, f: impl FnOnce() -> R) -> R
    where
        S: TranslationStorage + ?Sized,
    {
        let before = storage.query_count();
        let result = f();
        let issued = storage.query_count() - before;
        assert_eq!(
            issued, expected,
            "expected {expected} round-trips, {issued} were issued"
        );
        result
    }

    /// Assert that a ParlanceResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &ParlanceResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {:?}", result);
    }

    /// Assert that a ParlanceResult is Err.
    #[track_caller]
    pub fn assert_err<T: std::fmt::Debug>(result: &ParlanceResult<T>) {
        assert!(result.is_err(), "Expected Err, got Ok: {:?}", result);
    }

    /// Assert that a ParlanceResult is a Storage error.
    #[track_caller]
    pub fn assert_storage_error<T: std::fmt::Debug>(result: &ParlanceResult<T>) {
        match result {
            Err(ParlanceError::Storage(_)) => {}
            other => panic!("Expected Storage error, got: {:?}", other),
        }
    }

    /// Assert that a ParlanceResult is an Unavailable storage error.
    #[track_caller]
    pub fn assert_store_unavailable<T: std::fmt::Debug>(result: &ParlanceResult<T>) {
        match result {
            Err(ParlanceError::Storage(StorageError::Unavailable { .. })) => {}
            other => panic!("Expected Unavailable storage error, got: {:?}", other),
        }
    }

    /// Assert that a ParlanceResult is a Validation error.
    #[track_caller]
    pub fn assert_validation_error<T: std::fmt::Debug>(result: &ParlanceResult<T>) {
        match result {
            Err(ParlanceError::Validation(_)) => {}
            other => panic!("Expected Validation error, got: {:?}", other),
        }
    }

    /// Assert that a ParlanceResult is a Config error.
    #[track_caller]
    pub fn assert_config_error<T: std::fmt::Debug>(result: &ParlanceResult<T>) {
        match result {
            Err(ParlanceError::Config(_)) => {}
            other => panic!("Expected Config error, got: {:?}", other),
        }
    }

    /// Assert that a resolution served `served` for a request of `requested`.
    #[track_caller]
    pub fn assert_resolved_in(resolution: &Resolution, requested: &LanguageCode, served: &LanguageCode) {
        match resolution {
            Resolution::Found {
                variant,
                requested: r,
                ..
            } => {
                assert_eq!(r, requested, "Wrong requested language");
                assert_eq!(&variant.language_code, served, "Wrong served language");
            }
            Resolution::Unavailable => {
                panic!("Expected a translation in {served} for {requested}, got none")
            }
        }
    }

    /// Assert that a TranslationConfig is valid.
    #[track_caller]
    pub fn assert_config_valid(config: &TranslationConfig) {
        if let Err(e) = config.validate() {
            panic!("Config validation failed: {:?}", e);
        }
    }
}
