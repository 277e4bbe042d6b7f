//! Error types for Parlance operations

use crate::{LanguageCode, RecordId};
use thiserror::Error;

/// Backing store errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: RecordId },

    #[error("Translation not found: {entity} with id {id} in language {language}")]
    TranslationNotFound {
        entity: String,
        id: RecordId,
        language: LanguageCode,
    },

    #[error("Insert failed for {entity}: {reason}")]
    InsertFailed { entity: String, reason: String },

    #[error("Backing store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// External cache errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("Cache backend failure: {reason}")]
    Backend { reason: String },

    #[error("Cache serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Validation errors raised at the point of use.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid language code: {value:?}")]
    InvalidLanguageCode { value: String },

    #[error("Model {model} has no translated field named {field}")]
    UnknownField { model: String, field: String },

    #[error("Model {model} has no translation relation named {relation}")]
    UnknownRelation { model: String, relation: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("The model {model} already has an associated translation table {translation}")]
    DuplicateTranslationModel { model: String, translation: String },

    #[error("The model {model} already has an associated translation relation named {relation}")]
    DuplicateRelation { model: String, relation: String },

    #[error("The translated field {field} of {model} is already provided by another translation table")]
    DuplicateField { model: String, field: String },
}

/// Master error type for all Parlance errors.
#[derive(Debug, Clone, Error)]
pub enum ParlanceError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Parlance operations.
pub type ParlanceResult<T> = Result<T, ParlanceError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity: "testapp.SimpleModel".to_string(),
            id: RecordId::new(7),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Record not found"));
        assert!(msg.contains("testapp.SimpleModel"));
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_translation_not_found_names_language() {
        let err = StorageError::TranslationNotFound {
            entity: "testapp.SimpleModelTranslation".to_string(),
            id: RecordId::new(1),
            language: LanguageCode::new("nl").expect("valid code"),
        };
        assert!(err.to_string().ends_with("in language nl"));
    }

    #[test]
    fn test_master_error_from_conversions() {
        let err: ParlanceError = StorageError::LockPoisoned.into();
        assert!(matches!(err, ParlanceError::Storage(StorageError::LockPoisoned)));

        let err: ParlanceError = CacheError::Backend {
            reason: "down".to_string(),
        }
        .into();
        assert!(matches!(err, ParlanceError::Cache(_)));

        let err: ParlanceError = ValidationError::InvalidLanguageCode {
            value: "??".to_string(),
        }
        .into();
        assert!(matches!(err, ParlanceError::Validation(_)));

        let err: ParlanceError = ConfigError::InvalidValue {
            field: "cache_key_prefix".to_string(),
            value: "a b".to_string(),
            reason: "whitespace".to_string(),
        }
        .into();
        assert!(err.to_string().starts_with("Config error"));
    }
}
