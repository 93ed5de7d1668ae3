//! Prompt kinds and the per-kind vocabulary used by validation.

use crate::i18n::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Top-level fields of the structured (JSON) analysis output.
pub const STRUCTURED_OUTPUT_FIELDS: [&str; 6] = [
    "screenDescription",
    "uxSurvey",
    "audience",
    "behavior",
    "problemsAndSolutions",
    "selfCheck",
];

/// Closed set of analysis prompt kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PromptType {
    /// Free-form UX analysis
    Main,
    /// UX analysis returned as JSON
    Json,
    /// Alternate JSON variant with a stricter section layout
    JsonStructured,
    /// A/B test ideas for the analyzed screen
    AbTest,
    /// Business metrics and conversion analysis
    BusinessAnalytics,
    /// Product hypothesis generation
    Hypotheses,
}

impl PromptType {
    pub const ALL: [PromptType; 6] = [
        PromptType::Main,
        PromptType::Json,
        PromptType::JsonStructured,
        PromptType::AbTest,
        PromptType::BusinessAnalytics,
        PromptType::Hypotheses,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptType::Main => "main",
            PromptType::Json => "json",
            PromptType::JsonStructured => "json-structured",
            PromptType::AbTest => "ab-test",
            PromptType::BusinessAnalytics => "business-analytics",
            PromptType::Hypotheses => "hypotheses",
        }
    }

    /// File name of this kind's template in template storage.
    pub fn filename(&self) -> &'static str {
        match self {
            PromptType::Main => "main-prompt.txt",
            PromptType::Json => "json-prompt.txt",
            PromptType::JsonStructured => "json-structured-prompt.txt",
            PromptType::AbTest => "ab-test-prompt.txt",
            PromptType::BusinessAnalytics => "business-analytics-prompt.txt",
            PromptType::Hypotheses => "hypotheses-prompt.txt",
        }
    }

    /// Whether responses to this kind are expected to be JSON.
    pub fn expects_structured_output(&self) -> bool {
        matches!(self, PromptType::Json | PromptType::JsonStructured)
    }

    /// Lowercase keyword stems a template of this kind must mention.
    pub fn required_keywords(&self, language: Language) -> &'static [&'static str] {
        let russian = language == Language::RUSSIAN;
        match (self, russian) {
            (PromptType::Main, true) => &["ux", "анализ", "рекомендац"],
            (PromptType::Main, false) => &["ux", "analy", "recommend"],
            (PromptType::Json, true) => &["json", "анализ"],
            (PromptType::Json, false) => &["json", "analy"],
            (PromptType::JsonStructured, true) => &["json", "структур"],
            (PromptType::JsonStructured, false) => &["json", "structur"],
            (PromptType::AbTest, true) => &["a/b", "гипотез", "метрик"],
            (PromptType::AbTest, false) => &["a/b", "hypothes", "metric"],
            (PromptType::BusinessAnalytics, true) => &["бизнес", "конверси", "метрик"],
            (PromptType::BusinessAnalytics, false) => &["business", "conversion", "metric"],
            (PromptType::Hypotheses, true) => &["гипотез", "приоритет"],
            (PromptType::Hypotheses, false) => &["hypothes", "priorit"],
        }
    }

    /// Required keywords absent from `content` (case-insensitive).
    pub fn missing_keywords(&self, content: &str, language: Language) -> Vec<&'static str> {
        let lowered = content.to_lowercase();
        self.required_keywords(language)
            .iter()
            .copied()
            .filter(|keyword| !lowered.contains(keyword))
            .collect()
    }

    /// Structured-output field identifiers absent from `content` (case-sensitive).
    pub fn missing_output_fields(&self, content: &str) -> Vec<&'static str> {
        if !self.expects_structured_output() {
            return Vec::new();
        }
        STRUCTURED_OUTPUT_FIELDS
            .iter()
            .copied()
            .filter(|field| !content.contains(field))
            .collect()
    }
}

impl fmt::Display for PromptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
