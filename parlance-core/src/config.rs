//! Runtime configuration for translation resolution.
//!
//! Configuration is read at resolution time through a [`SettingsHandle`],
//! never captured by the resolver, so toggling caching or changing the key
//! prefix takes effect on the next access.

use crate::{ConfigError, LanguageCode, ParlanceError, ParlanceResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// Default lifetime of external cache entries.
const DEFAULT_CACHE_TIMEOUT: Duration = Duration::from_secs(86_400);

// ============================================================================
// TRANSLATION CONFIGURATION
// ============================================================================

/// Settings consulted by the resolver on every access.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Whether resolved translations are written to the external cache.
    pub caching_enabled: bool,

    /// Prefix embedded in every cache key. Empty means no prefix.
    pub cache_key_prefix: String,

    /// Lifetime of external cache entries. Zero means entries never expire.
    pub cache_timeout: Duration,

    /// Language used when the caller has no preference of its own.
    pub default_language: LanguageCode,

    /// Ordered fallback chain used for languages without an override.
    pub fallback_languages: Vec<LanguageCode>,

    /// Per-language fallback chains, replacing `fallback_languages`.
    #[serde(default)]
    pub language_fallbacks: BTreeMap<LanguageCode, Vec<LanguageCode>>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        let default_language = LanguageCode::trusted("en");
        Self {
            caching_enabled: true,
            cache_key_prefix: String::new(),
            cache_timeout: DEFAULT_CACHE_TIMEOUT,
            fallback_languages: vec![default_language.clone()],
            default_language,
            language_fallbacks: BTreeMap::new(),
        }
    }
}

impl TranslationConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PARLANCE_ENABLE_CACHING`: "true" or "false" (default: true)
    /// - `PARLANCE_CACHE_PREFIX`: Cache key prefix (default: empty)
    /// - `PARLANCE_CACHE_TIMEOUT_SECS`: Entry lifetime, 0 = no expiry (default: 86400)
    /// - `PARLANCE_DEFAULT_LANGUAGE`: Default language code (default: en)
    /// - `PARLANCE_FALLBACK_LANGUAGES`: Comma-separated fallback chain (default: the default language)
    ///
    /// Malformed language codes and prefixes are rejected immediately.
    pub fn from_env() -> ParlanceResult<Self> {
        let mut config = Self::default();

        if let Ok(value) = std::env::var("PARLANCE_ENABLE_CACHING") {
            config.caching_enabled = value.to_lowercase() != "false" && value != "0";
        }

        if let Ok(prefix) = std::env::var("PARLANCE_CACHE_PREFIX") {
            config.cache_key_prefix = prefix;
        }

        if let Ok(value) = std::env::var("PARLANCE_CACHE_TIMEOUT_SECS") {
            let secs = value.parse::<u64>().map_err(|_| {
                ParlanceError::Config(ConfigError::InvalidValue {
                    field: "cache_timeout".to_string(),
                    value: value.clone(),
                    reason: "expected a whole number of seconds".to_string(),
                })
            })?;
            config.cache_timeout = Duration::from_secs(secs);
        }

        if let Ok(code) = std::env::var("PARLANCE_DEFAULT_LANGUAGE") {
            config.default_language = LanguageCode::new(code)?;
            config.fallback_languages = vec![config.default_language.clone()];
        }

        if let Ok(list) = std::env::var("PARLANCE_FALLBACK_LANGUAGES") {
            config.fallback_languages = list
                .split(',')
                .map(str::trim)
                .filter(|code| !code.is_empty())
                .map(LanguageCode::new)
                .collect::<ParlanceResult<Vec<_>>>()?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Enable or disable the external cache.
    pub fn with_caching(mut self, enabled: bool) -> Self {
        self.caching_enabled = enabled;
        self
    }

    /// Set the cache key prefix.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.cache_key_prefix = prefix.into();
        self
    }

    /// Set the cache entry lifetime.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.cache_timeout = timeout;
        self
    }

    /// Set the default language.
    pub fn with_default_language(mut self, language: LanguageCode) -> Self {
        self.default_language = language;
        self
    }

    /// Replace the default fallback chain.
    pub fn with_fallbacks(mut self, fallbacks: Vec<LanguageCode>) -> Self {
        self.fallback_languages = fallbacks;
        self
    }

    /// Override the fallback chain of a single language.
    pub fn with_language_fallbacks(
        mut self,
        language: LanguageCode,
        fallbacks: Vec<LanguageCode>,
    ) -> Self {
        self.language_fallbacks.insert(language, fallbacks);
        self
    }

    /// Lifetime handed to the cache store, `None` when entries never expire.
    pub fn cache_ttl(&self) -> Option<Duration> {
        if self.cache_timeout.is_zero() {
            None
        } else {
            Some(self.cache_timeout)
        }
    }

    /// Ordered fallback languages to try after `language` itself.
    ///
    /// The requested language is never part of its own chain and each
    /// fallback appears once.
    pub fn fallbacks_for(&self, language: &LanguageCode) -> Vec<LanguageCode> {
        let chain = self
            .language_fallbacks
            .get(language)
            .unwrap_or(&self.fallback_languages);

        let mut result: Vec<LanguageCode> = Vec::with_capacity(chain.len());
        for candidate in chain {
            if candidate != language && !result.contains(candidate) {
                result.push(candidate.clone());
            }
        }
        result
    }

    /// Validate the configuration.
    pub fn validate(&self) -> ParlanceResult<()> {
        let prefix = &self.cache_key_prefix;

        if prefix.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(ParlanceError::Config(ConfigError::InvalidValue {
                field: "cache_key_prefix".to_string(),
                value: prefix.clone(),
                reason: "cache_key_prefix must not contain whitespace or control characters"
                    .to_string(),
            }));
        }

        // Keys join the prefix with a single '.', a leading or trailing one would double it.
        if prefix.starts_with('.') || prefix.ends_with('.') {
            return Err(ParlanceError::Config(ConfigError::InvalidValue {
                field: "cache_key_prefix".to_string(),
                value: prefix.clone(),
                reason: "cache_key_prefix must not start or end with '.'".to_string(),
            }));
        }

        for (language, chain) in &self.language_fallbacks {
            if chain.is_empty() {
                return Err(ParlanceError::Config(ConfigError::InvalidValue {
                    field: "language_fallbacks".to_string(),
                    value: language.to_string(),
                    reason: "a per-language fallback override must list at least one language"
                        .to_string(),
                }));
            }
        }

        Ok(())
    }
}

// ============================================================================
// SHARED SETTINGS HANDLE
// ============================================================================

/// Shared, live view of the [`TranslationConfig`].
#[derive(Debug, Clone, Default)]
pub struct SettingsHandle {
    inner: Arc<RwLock<TranslationConfig>>,
}

impl SettingsHandle {
    /// Wrap a configuration in a shared handle.
    pub fn new(config: TranslationConfig) -> Self {
        Self {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// Snapshot of the current settings.
    pub fn current(&self) -> TranslationConfig {
        match self.inner.read() {
            Ok(config) => config.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Mutate the settings in place.
    pub fn update(&self, f: impl FnOnce(&mut TranslationConfig)) {
        match self.inner.write() {
            Ok(mut config) => f(&mut config),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// Replace the settings wholesale.
    pub fn replace(&self, config: TranslationConfig) -> TranslationConfig {
        let mut previous = None;
        self.update(|current| previous = Some(std::mem::replace(current, config)));
        previous.unwrap_or_default()
    }

    /// Apply a temporary change, reverted when the returned guard drops.
    pub fn override_settings(&self, f: impl FnOnce(&mut TranslationConfig)) -> SettingsGuard {
        let previous = self.current();
        self.update(f);
        SettingsGuard {
            handle: self.clone(),
            previous: Some(previous),
        }
    }
}

/// Restores the previous settings on drop.
#[derive(Debug)]
#[must_use = "settings are restored as soon as the guard is dropped"]
pub struct SettingsGuard {
    handle: SettingsHandle,
    previous: Option<TranslationConfig>,
}

impl Drop for SettingsGuard {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.handle.replace(previous);
        }
    }
}
