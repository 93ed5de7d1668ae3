//! Language registry: Single source of truth for all supported languages.
//!
//! The registry is a static, read-only table initialized once with `OnceLock`.
//! Everything that varies per language (writing system, detection threshold,
//! localized prompt strings) hangs off a `LanguageConfig` entry here.

use crate::i18n::strings::{LanguageStrings, ENGLISH_STRINGS, RUSSIAN_STRINGS};
use std::sync::OnceLock;

/// Writing system used to tell languages apart by character ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    Cyrillic,
    Latin,
}

impl Script {
    /// Check whether an alphabetic character belongs to this script.
    pub fn contains(&self, c: char) -> bool {
        match self {
            Script::Cyrillic => matches!(c, '\u{0400}'..='\u{04FF}' | '\u{0500}'..='\u{052F}'),
            Script::Latin => c.is_ascii_alphabetic() || matches!(c, '\u{00C0}'..='\u{024F}'),
        }
    }
}

/// Configuration for a supported language.
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// ISO 639-1 language code (e.g., "ru", "en")
    pub code: &'static str,

    /// English name of the language (e.g., "Russian", "English")
    pub name: &'static str,

    /// Native name of the language (e.g., "Русский", "English")
    pub native_name: &'static str,

    /// Whether this is the default language (exactly one should be true)
    pub is_default: bool,

    /// Whether this language is enabled for use
    pub enabled: bool,

    /// Writing system of the language
    pub script: Script,

    /// Minimum share of letters in `script` for text to be classified as this language
    pub detection_threshold: f64,

    /// Localized prompt and message strings
    pub strings: &'static LanguageStrings,
}

/// Global language registry singleton.
pub struct LanguageRegistry {
    languages: Vec<LanguageConfig>,
}

static REGISTRY: OnceLock<LanguageRegistry> = OnceLock::new();

impl LanguageRegistry {
    /// Get the global language registry instance.
    pub fn get() -> &'static LanguageRegistry {
        REGISTRY.get_or_init(|| LanguageRegistry {
            languages: default_languages(),
        })
    }

    /// Get a language configuration by its exact code.
    pub fn get_by_code(&self, code: &str) -> Option<&LanguageConfig> {
        self.languages.iter().find(|lang| lang.code == code)
    }

    /// Get all enabled languages, in detection priority order.
    pub fn list_enabled(&self) -> Vec<&LanguageConfig> {
        self.languages.iter().filter(|lang| lang.enabled).collect()
    }

    /// Get the default language configuration.
    ///
    /// # Panics
    /// Panics if the table does not define exactly one default language
    /// (a configuration error in `default_languages`).
    pub fn default_language(&self) -> &LanguageConfig {
        let defaults: Vec<_> = self
            .languages
            .iter()
            .filter(|lang| lang.is_default)
            .collect();

        match defaults.len() {
            0 => panic!("No default language found in registry"),
            1 => defaults[0],
            _ => panic!("Multiple default languages found in registry"),
        }
    }

    /// Check if a language code is supported and enabled.
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_by_code(code)
            .map(|lang| lang.enabled)
            .unwrap_or(false)
    }
}

/// Default language configurations.
///
/// Russian is listed first: it is the default and is checked first during
/// script-ratio detection because Russian prompts routinely embed Latin
/// identifiers (JSON field names, "UX", "A/B").
fn default_languages() -> Vec<LanguageConfig> {
    vec![
        LanguageConfig {
            code: "ru",
            name: "Russian",
            native_name: "Русский",
            is_default: true,
            enabled: true,
            script: Script::Cyrillic,
            detection_threshold: 0.3,
            strings: &RUSSIAN_STRINGS,
        },
        LanguageConfig {
            code: "en",
            name: "English",
            native_name: "English",
            is_default: false,
            enabled: true,
            script: Script::Latin,
            detection_threshold: 0.7,
            strings: &ENGLISH_STRINGS,
        },
    ]
}
