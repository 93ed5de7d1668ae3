//! Language type: validated language representation.
//!
//! A `Language` can only be constructed for codes present and enabled in the
//! registry, so everything downstream can rely on `config()` succeeding.

use crate::i18n::registry::{LanguageConfig, LanguageRegistry, Script};
use crate::i18n::strings::LanguageStrings;
use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A validated, supported language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Language {
    /// ISO 639-1 language code (e.g., "ru", "en")
    code: &'static str,
}

impl Language {
    pub const RUSSIAN: Language = Language { code: "ru" };
    pub const ENGLISH: Language = Language { code: "en" };

    /// Create a Language from an exact, already-normalized language code.
    ///
    /// # Returns
    /// * `Ok(Language)` if the code is registered and enabled
    /// * `Err` if the code is unknown or disabled
    pub fn from_code(code: &str) -> Result<Language> {
        match LanguageRegistry::get().get_by_code(code) {
            Some(config) if config.enabled => Ok(Language { code: config.code }),
            Some(_) => bail!("Language '{}' is not enabled", code),
            None => bail!("Unknown language code: '{}'", code),
        }
    }

    /// Create a Language from a loose language tag such as `"en-US"`,
    /// `" RU "` or `"pt_BR"`.
    ///
    /// Returns `None` when the normalized tag is not a supported language.
    pub fn from_tag(tag: &str) -> Option<Language> {
        Language::from_code(&normalize_tag(tag)).ok()
    }

    /// Get the default language.
    pub fn default_language() -> Language {
        Language {
            code: LanguageRegistry::get().default_language().code,
        }
    }

    /// All enabled languages in registry order.
    pub fn all() -> Vec<Language> {
        LanguageRegistry::get()
            .list_enabled()
            .into_iter()
            .map(|config| Language { code: config.code })
            .collect()
    }

    /// Get the ISO 639-1 language code.
    pub fn code(&self) -> &'static str {
        self.code
    }

    /// Get the full language configuration from the registry.
    ///
    /// # Panics
    /// Panics if the code is missing from the registry, which cannot happen
    /// for values built through `from_code`, `from_tag` or the constants.
    pub fn config(&self) -> &'static LanguageConfig {
        LanguageRegistry::get()
            .get_by_code(self.code)
            .expect("Language code should always be valid")
    }

    /// English name of the language (e.g., "Russian").
    pub fn name(&self) -> &'static str {
        self.config().name
    }

    /// Native name of the language (e.g., "Русский").
    pub fn native_name(&self) -> &'static str {
        self.config().native_name
    }

    pub fn script(&self) -> Script {
        self.config().script
    }

    /// Localized strings for this language.
    pub fn strings(&self) -> &'static LanguageStrings {
        self.config().strings
    }

    pub fn is_default(&self) -> bool {
        self.config().is_default
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::default_language()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code)
    }
}

impl Serialize for Language {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code)
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = String::deserialize(deserializer)?;
        Language::from_code(&code).map_err(serde::de::Error::custom)
    }
}

/// Normalize a language tag: trim, drop the region subtag, lowercase.
///
/// `"en-US"` → `"en"`, `"ru_RU"` → `"ru"`, `" DE "` → `"de"`.
pub fn normalize_tag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Constant Tests ====================

    #[test]
    fn test_russian_constant() {
        let russian = Language::RUSSIAN;
        assert_eq!(russian.code(), "ru");
        assert_eq!(russian.name(), "Russian");
        assert!(russian.is_default());
    }

    #[test]
    fn test_english_constant() {
        let english = Language::ENGLISH;
        assert_eq!(english.code(), "en");
        assert_eq!(english.native_name(), "English");
        assert!(!english.is_default());
    }

    // ==================== from_code Tests ====================

    #[test]
    fn test_from_code_valid() {
        assert_eq!(Language::from_code("ru").ok(), Some(Language::RUSSIAN));
        assert_eq!(Language::from_code("en").ok(), Some(Language::ENGLISH));
    }

    #[test]
    fn test_from_code_invalid() {
        let result = Language::from_code("fr");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Unknown"));
    }

    #[test]
    fn test_from_code_does_not_normalize() {
        assert!(Language::from_code("en-US").is_err());
        assert!(Language::from_code("").is_err());
    }

    // ==================== from_tag Tests ====================

    #[test]
    fn test_from_tag_strips_region() {
        assert_eq!(Language::from_tag("en-US"), Some(Language::ENGLISH));
        assert_eq!(Language::from_tag("ru_RU"), Some(Language::RUSSIAN));
    }

    #[test]
    fn test_from_tag_lowercases_and_trims() {
        assert_eq!(Language::from_tag("  RU "), Some(Language::RUSSIAN));
    }

    #[test]
    fn test_from_tag_unsupported() {
        assert_eq!(Language::from_tag("de-DE"), None);
        assert_eq!(Language::from_tag(""), None);
    }

    // ==================== normalize_tag Tests ====================

    #[test]
    fn test_normalize_tag() {
        assert_eq!(normalize_tag("en-US"), "en");
        assert_eq!(normalize_tag("zh-Hant-TW"), "zh");
        assert_eq!(normalize_tag("RU"), "ru");
        assert_eq!(normalize_tag(""), "");
    }

    // ==================== Default / all ====================

    #[test]
    fn test_default_language() {
        assert_eq!(Language::default_language(), Language::RUSSIAN);
        assert_eq!(Language::default(), Language::RUSSIAN);
    }

    #[test]
    fn test_all_languages() {
        assert_eq!(Language::all(), vec![Language::RUSSIAN, Language::ENGLISH]);
    }

    // ==================== Trait Tests ====================

    #[test]
    fn test_display() {
        assert_eq!(Language::ENGLISH.to_string(), "en");
    }

    #[test]
    fn test_serde_as_code() {
        let json = serde_json::to_string(&Language::RUSSIAN).expect("serialize");
        assert_eq!(json, "\"ru\"");

        let parsed: Language = serde_json::from_str("\"en\"").expect("deserialize");
        assert_eq!(parsed, Language::ENGLISH);

        let invalid: Result<Language, _> = serde_json::from_str("\"xx\"");
        assert!(invalid.is_err());
    }

    #[test]
    fn test_strings_lookup() {
        assert!(Language::RUSSIAN.strings().context_heading.contains("контекст"));
        assert!(Language::ENGLISH.strings().context_heading.contains("context"));
    }
}
