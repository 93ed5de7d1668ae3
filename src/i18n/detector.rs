//! Dominant-language detection.
//!
//! Callers depend on the `LanguageClassifier` trait only; the shipped
//! implementation compares alphabet ratios and can be replaced by a
//! statistical detector without touching call sites.

use crate::i18n::language::Language;
use serde::Serialize;

/// Outcome of classifying a piece of text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Detection {
    /// Dominant language, `None` when no language reaches its threshold
    pub language: Option<Language>,

    /// Share of letters belonging to the detected language's script (0.0-1.0)
    pub ratio: f64,

    /// Number of alphabetic characters considered
    pub letters: usize,
}

pub trait LanguageClassifier: Send + Sync {
    /// Classify the dominant language of `text`.
    fn detect(&self, text: &str) -> Detection;
}

/// Classifies text by the share of letters written in each language's script.
///
/// Languages are tried in registry order; the first whose share reaches its
/// configured threshold wins.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptRatioClassifier;

impl LanguageClassifier for ScriptRatioClassifier {
    fn detect(&self, text: &str) -> Detection {
        let letters = text.chars().filter(|c| c.is_alphabetic()).count();
        if letters == 0 {
            return Detection {
                language: None,
                ratio: 0.0,
                letters,
            };
        }

        for language in Language::all() {
            let ratio = script_ratio(text, language);
            if ratio >= language.config().detection_threshold {
                return Detection {
                    language: Some(language),
                    ratio,
                    letters,
                };
            }
        }

        Detection {
            language: None,
            ratio: 0.0,
            letters,
        }
    }
}

/// Share of alphabetic characters in `text` that belong to `language`'s script.
///
/// Returns 0.0 for text without letters.
pub fn script_ratio(text: &str, language: Language) -> f64 {
    let script = language.script();
    let (matching, total) = text
        .chars()
        .filter(|c| c.is_alphabetic())
        .fold((0usize, 0usize), |(matching, total), c| {
            (matching + usize::from(script.contains(c)), total + 1)
        });

    if total == 0 {
        0.0
    } else {
        matching as f64 / total as f64
    }
}
