//! Validated language codes.

use crate::{ParlanceResult, ValidationError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Primary subtag of 2-3 letters, followed by optional `-` or `_`
/// separated subtags (`en`, `en-us`, `zh-hans`, `pt_BR`).
static LANGUAGE_CODE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z]{2,3}(?:[-_][A-Za-z0-9]{1,8})*$")
        .unwrap_or_else(|e| panic!("language code pattern must compile: {e}"))
});

/// A language code such as `en` or `zh-hans`.
///
/// Construction validates the code, so a `LanguageCode` can always be
/// embedded in a cache key without escaping. Codes are stored lowercase
/// with `-` between subtags: `pt_BR`, `PT-br` and `pt-br` are one language.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LanguageCode(String);

impl LanguageCode {
    /// Validate and wrap a language code.
    pub fn new(code: impl Into<String>) -> ParlanceResult<Self> {
        Ok(Self::try_from(code.into())?)
    }

    /// The code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap a code known to match the pattern, such as a built-in default.
    pub(crate) fn trusted(code: &str) -> Self {
        debug_assert!(LANGUAGE_CODE_RE.is_match(code));
        Self(code.to_string())
    }
}

impl FromStr for LanguageCode {
    type Err = crate::ParlanceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for LanguageCode {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if LANGUAGE_CODE_RE.is_match(&value) {
            Ok(Self(value.to_ascii_lowercase().replace('_', "-")))
        } else {
            Err(ValidationError::InvalidLanguageCode { value })
        }
    }
}

impl From<LanguageCode> for String {
    fn from(code: LanguageCode) -> Self {
        code.0
    }
}

impl AsRef<str> for LanguageCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ParlanceError;

    #[test]
    fn test_accepts_common_codes() {
        for code in ["en", "nl", "fil", "en-us", "zh-hans", "pt_BR", "sr-latn-rs"] {
            assert!(LanguageCode::new(code).is_ok(), "{code} should be valid");
        }
    }

    #[test]
    fn test_codes_are_normalised() {
        let expected = LanguageCode::new("pt-br").expect("valid code");
        for code in ["pt_BR", "PT-BR", "pt_br"] {
            assert_eq!(LanguageCode::new(code).expect("valid code"), expected);
        }
        assert_eq!(LanguageCode::new("EN").expect("valid code").as_str(), "en");

        let parsed: LanguageCode = serde_json::from_str("\"zh_Hans\"").expect("valid code");
        assert_eq!(parsed.as_str(), "zh-hans");
    }

    #[test]
    fn test_rejects_malformed_codes() {
        for code in ["", "e", "english", "en-", "en us", "en.us", "12", "en-toolongsubtag"] {
            let err = LanguageCode::new(code).expect_err("code should be rejected");
            assert!(matches!(
                err,
                ParlanceError::Validation(ValidationError::InvalidLanguageCode { .. })
            ));
        }
    }

    #[test]
    fn test_serde_rejects_invalid_code() {
        let ok: LanguageCode = serde_json::from_str("\"fr\"").expect("valid code");
        assert_eq!(ok.as_str(), "fr");
        assert!(serde_json::from_str::<LanguageCode>("\"not a code\"").is_err());
    }

    #[test]
    fn test_from_str_and_display() {
        let code: LanguageCode = "de-at".parse().expect("valid code");
        assert_eq!(code.to_string(), "de-at");
    }
}
