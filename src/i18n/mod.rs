//! Internationalization (i18n) module for multi-language support.
//!
//! All language-related logic lives here: the registry of supported
//! languages, localized prompt strings, language detection, request language
//! resolution and UI translation lookup.
//!
//! # Architecture
//!
//! - `registry`: Single source of truth for all supported languages and their metadata
//! - `language`: Type-safe Language type, only constructible for registered languages
//! - `strings`: Localized prompt fragments (directives, markers, keywords)
//! - `detector`: Dominant-language classification behind a trait
//! - `resolver`: Per-request language resolution from preferences and client hints
//! - `catalog`: UI translation lookup with language fallback
//!
//! # Example
//!
//! ```rust,ignore
//! use prompt_consistency::i18n::{Language, LanguageRegistry};
//!
//! // Default language (Russian)
//! let default = Language::default_language();
//!
//! // Loose tags are normalized
//! let english = Language::from_tag("en-US");
//!
//! // List all enabled languages
//! let languages = LanguageRegistry::get().list_enabled();
//! ```

pub mod catalog;
pub mod detector;
mod language;
mod registry;
pub mod resolver;
mod strings;

pub use catalog::{interpolate, TranslationCatalog};
pub use detector::{script_ratio, Detection, LanguageClassifier, ScriptRatioClassifier};
pub use language::{normalize_tag, Language};
pub use registry::{LanguageConfig, LanguageRegistry, Script};
pub use resolver::{
    LanguageContext, LanguageResolver, LanguageSource, ResolutionTier, ResolvedLanguage,
    ResolverSignals,
};
pub use strings::LanguageStrings;
