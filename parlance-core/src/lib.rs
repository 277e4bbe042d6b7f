//! Parlance Core - Translation Data Types
//!
//! Pure data structures shared by every Parlance crate: identities,
//! language codes, model metadata, records with their object-local
//! translation cache, configuration and errors.
//! This crate contains no storage or cache logic.

pub mod config;
pub mod error;
pub mod language;
pub mod meta;
pub mod record;

pub use config::{SettingsGuard, SettingsHandle, TranslationConfig};
pub use error::{
    CacheError, ConfigError, ParlanceError, ParlanceResult, StorageError, ValidationError,
};
pub use language::LanguageCode;
pub use meta::{TranslatableModelMeta, TranslatedFieldSpec, TranslationExtension};
pub use record::{LocalTranslation, RecordRow, TranslatableRecord, TranslationVariant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Primary key of a translatable record.
///
/// Keys are rendered in decimal inside cache keys, so the textual form
/// must stay stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(u64);

impl RecordId {
    /// Wrap a raw primary key.
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// The raw primary key.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for RecordId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_id_display_is_decimal() {
        assert_eq!(RecordId::new(42).to_string(), "42");
        assert_eq!(RecordId::from(0).to_string(), "0");
    }

    #[test]
    fn test_record_id_serializes_transparently() {
        let json = serde_json::to_string(&RecordId::new(9)).expect("serialize");
        assert_eq!(json, "9");
        let back: RecordId = serde_json::from_str("9").expect("deserialize");
        assert_eq!(back.get(), 9);
    }
}
