//! Model metadata: which translation tables back a translatable model.
//!
//! A translatable model owns one or more translation extensions. Each
//! extension is a separate translation table reached through a named
//! relation (for example `translations`) and provides a disjoint set of
//! translated fields.

use crate::{ConfigError, ParlanceError, ParlanceResult, ValidationError};
use serde::{Deserialize, Serialize};

/// A translated field exposed on the shared model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslatedFieldSpec {
    /// Field name, identical on the shared model and the translation table.
    pub name: String,
    /// Return a value from any available language when the requested
    /// language and its fallbacks are all missing.
    pub any_language: bool,
}

/// One translation table attached to a translatable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationExtension {
    rel_name: String,
    translation_entity: String,
    fields: Vec<TranslatedFieldSpec>,
}

impl TranslationExtension {
    /// Create an extension reached through `rel_name`, stored as `translation_entity`.
    ///
    /// `translation_entity` is the qualified entity name embedded in cache
    /// keys, for example `testapp.SimpleModelTranslation`.
    pub fn new(rel_name: impl Into<String>, translation_entity: impl Into<String>) -> Self {
        Self {
            rel_name: rel_name.into(),
            translation_entity: translation_entity.into(),
            fields: Vec::new(),
        }
    }

    /// Add a translated field.
    pub fn with_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(TranslatedFieldSpec {
            name: name.into(),
            any_language: false,
        });
        self
    }

    /// Add a translated field that falls back to any available language.
    pub fn with_any_language_field(mut self, name: impl Into<String>) -> Self {
        self.fields.push(TranslatedFieldSpec {
            name: name.into(),
            any_language: true,
        });
        self
    }

    pub fn rel_name(&self) -> &str {
        &self.rel_name
    }

    pub fn translation_entity(&self) -> &str {
        &self.translation_entity
    }

    pub fn fields(&self) -> &[TranslatedFieldSpec] {
        &self.fields
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&TranslatedFieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// Translation metadata of a shared model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatableModelMeta {
    model_name: String,
    extensions: Vec<TranslationExtension>,
    /// Untranslated datetime columns of the shared model.
    datetime_fields: Vec<String>,
}

impl TranslatableModelMeta {
    /// Create metadata for `model_name` with its root translation table.
    pub fn new(model_name: impl Into<String>, root: TranslationExtension) -> ParlanceResult<Self> {
        let mut meta = Self {
            model_name: model_name.into(),
            extensions: Vec::new(),
            datetime_fields: Vec::new(),
        };
        meta.add_extension(root)?;
        Ok(meta)
    }

    /// Attach another translation table.
    ///
    /// Fails when the translation entity or the relation name is already
    /// registered, or when one of its fields is already provided by an
    /// existing table.
    pub fn add_extension(&mut self, extension: TranslationExtension) -> ParlanceResult<()> {
        for existing in &self.extensions {
            if existing.translation_entity == extension.translation_entity {
                return Err(ParlanceError::Config(ConfigError::DuplicateTranslationModel {
                    model: self.model_name.clone(),
                    translation: extension.translation_entity,
                }));
            }
            if existing.rel_name == extension.rel_name {
                return Err(ParlanceError::Config(ConfigError::DuplicateRelation {
                    model: self.model_name.clone(),
                    relation: extension.rel_name,
                }));
            }
            if let Some(field) = extension.fields.iter().find(|f| existing.has_field(&f.name)) {
                return Err(ParlanceError::Config(ConfigError::DuplicateField {
                    model: self.model_name.clone(),
                    field: field.name.clone(),
                }));
            }
        }
        if let Some(field) = extension
            .fields
            .iter()
            .find(|f| self.has_datetime_field(&f.name))
        {
            return Err(ParlanceError::Config(ConfigError::DuplicateField {
                model: self.model_name.clone(),
                field: field.name.clone(),
            }));
        }
        self.extensions.push(extension);
        Ok(())
    }

    /// Declare an untranslated datetime column on the shared model.
    pub fn with_datetime_field(mut self, name: impl Into<String>) -> ParlanceResult<Self> {
        let name = name.into();
        let taken = self.has_datetime_field(&name)
            || self.extensions.iter().any(|e| e.has_field(&name));
        if taken {
            return Err(ParlanceError::Config(ConfigError::DuplicateField {
                model: self.model_name.clone(),
                field: name,
            }));
        }
        self.datetime_fields.push(name);
        Ok(self)
    }

    pub fn datetime_fields(&self) -> &[String] {
        &self.datetime_fields
    }

    pub fn has_datetime_field(&self, name: &str) -> bool {
        self.datetime_fields.iter().any(|f| f == name)
    }

    /// Fail unless `name` is a declared datetime column.
    pub fn require_datetime_field(&self, name: &str) -> ParlanceResult<()> {
        if self.has_datetime_field(name) {
            Ok(())
        } else {
            Err(ParlanceError::Validation(ValidationError::UnknownField {
                model: self.model_name.clone(),
                field: name.to_string(),
            }))
        }
    }

    /// Builder form of [`Self::add_extension`].
    pub fn with_extension(mut self, extension: TranslationExtension) -> ParlanceResult<Self> {
        self.add_extension(extension)?;
        Ok(self)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// The first registered translation table.
    pub fn root(&self) -> &TranslationExtension {
        // `new` always registers the root extension.
        &self.extensions[0]
    }

    pub fn extensions(&self) -> &[TranslationExtension] {
        &self.extensions
    }

    /// Find the extension reached through `rel_name`.
    pub fn extension(&self, rel_name: &str) -> ParlanceResult<&TranslationExtension> {
        self.extensions
            .iter()
            .find(|e| e.rel_name == rel_name)
            .ok_or_else(|| {
                ParlanceError::Validation(ValidationError::UnknownRelation {
                    model: self.model_name.clone(),
                    relation: rel_name.to_string(),
                })
            })
    }

    /// Find the extension that provides `field`.
    pub fn extension_for_field(&self, field: &str) -> ParlanceResult<&TranslationExtension> {
        self.extensions
            .iter()
            .find(|e| e.has_field(field))
            .ok_or_else(|| {
                ParlanceError::Validation(ValidationError::UnknownField {
                    model: self.model_name.clone(),
                    field: field.to_string(),
                })
            })
    }
}
