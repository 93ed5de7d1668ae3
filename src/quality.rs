//! Response quality scoring.
//!
//! Each metric is computed independently from the response text; the overall
//! score is a fixed weighted combination of them.

use crate::i18n::{script_ratio, Language};
use crate::prompts::STRUCTURED_OUTPUT_FIELDS;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Characters up to which response length adds to completeness.
const COMPLETE_LENGTH_CHARS: usize = 1500;

/// Characters that close a finished response.
const TERMINAL_PUNCTUATION: [char; 9] = ['.', '!', '?', '}', ']', ')', '"', '»', '`'];

static HEADING_REGEX: OnceLock<Regex> = OnceLock::new();
static NUMBERED_REGEX: OnceLock<Regex> = OnceLock::new();
static BULLET_REGEX: OnceLock<Regex> = OnceLock::new();

/// Estimated token count: one token per four characters, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// Quality metrics of one generated response. Scores are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    pub completeness: f64,
    pub language_accuracy: f64,
    pub token_count: usize,
    pub has_structure: f64,
    pub is_truncated: bool,
    pub quality_score: f64,
}

/// Minimum acceptable values for [`QualityMetrics`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub min_completeness: f64,
    pub min_language_accuracy: f64,
    pub min_structure: f64,
    pub min_quality_score: f64,
    pub max_tokens: usize,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_completeness: 60.0,
            min_language_accuracy: 80.0,
            min_structure: 30.0,
            min_quality_score: 70.0,
            max_tokens: 8_000,
        }
    }
}

/// Closed set of problems observed in a generated response.
///
/// These are the only inputs the auto-corrector acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseIssue {
    /// Response is written in another language than requested
    LanguageMismatch,
    /// Too many letters outside the requested language's script
    LowLanguageAccuracy,
    /// Response is short or misses expected sections
    Incomplete,
    /// Response stops mid-sentence
    Truncated,
    /// Response has no headings, lists or JSON
    MissingStructure,
    /// Response is longer than the token limit
    TokenLimitExceeded,
    /// Structured response could not be parsed as JSON
    MalformedJson,
}

impl ResponseIssue {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseIssue::LanguageMismatch => "language-mismatch",
            ResponseIssue::LowLanguageAccuracy => "low-language-accuracy",
            ResponseIssue::Incomplete => "incomplete",
            ResponseIssue::Truncated => "truncated",
            ResponseIssue::MissingStructure => "missing-structure",
            ResponseIssue::TokenLimitExceeded => "token-limit-exceeded",
            ResponseIssue::MalformedJson => "malformed-json",
        }
    }
}

impl fmt::Display for ResponseIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores generated responses. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseQualityAnalyzer;

impl ResponseQualityAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn measure_quality(&self, text: &str, language: Language) -> QualityMetrics {
        let completeness = length_points(text) + marker_points(text, language);
        self.combine(text, text, completeness, language)
    }

    /// Quality of a JSON response.
    ///
    /// Language accuracy is measured on `prose` only, since the keys are not
    /// written in the response language. Section markers do not apply to
    /// JSON, so the recovered share of the structured output fields stands
    /// in for them in completeness.
    pub fn measure_quality_structured(
        &self,
        text: &str,
        prose: &str,
        recovered_fields: usize,
        language: Language,
    ) -> QualityMetrics {
        let total = STRUCTURED_OUTPUT_FIELDS.len();
        let field_points = recovered_fields.min(total) as f64 / total as f64 * 40.0;
        let completeness = length_points(text) + field_points;
        self.combine(text, prose, completeness, language)
    }

    fn combine(&self, text: &str, prose: &str, completeness: f64, language: Language) -> QualityMetrics {
        let completeness = completeness.clamp(0.0, 100.0);
        let language_accuracy = script_ratio(prose, language) * 100.0;
        let has_structure = structure_score(text);
        let is_truncated = is_truncated(text);

        let mut quality_score =
            0.3 * completeness + 0.3 * language_accuracy + 0.2 * has_structure;
        if !is_truncated {
            quality_score += 20.0;
        }

        QualityMetrics {
            completeness,
            language_accuracy,
            token_count: estimate_tokens(text),
            has_structure,
            is_truncated,
            quality_score: quality_score.clamp(0.0, 100.0),
        }
    }

    /// Every threshold met and the response is not truncated.
    pub fn meets_standards(&self, metrics: &QualityMetrics, thresholds: &QualityThresholds) -> bool {
        metrics.completeness >= thresholds.min_completeness
            && metrics.language_accuracy >= thresholds.min_language_accuracy
            && metrics.has_structure >= thresholds.min_structure
            && metrics.quality_score >= thresholds.min_quality_score
            && !metrics.is_truncated
    }

    /// Issues implied by the metrics alone, in declaration order.
    ///
    /// Language mismatch and malformed JSON need more than metrics and are
    /// reported by the orchestrator.
    pub fn issues(&self, metrics: &QualityMetrics, thresholds: &QualityThresholds) -> Vec<ResponseIssue> {
        let mut issues = Vec::new();
        if metrics.language_accuracy < thresholds.min_language_accuracy {
            issues.push(ResponseIssue::LowLanguageAccuracy);
        }
        if metrics.completeness < thresholds.min_completeness {
            issues.push(ResponseIssue::Incomplete);
        }
        if metrics.is_truncated {
            issues.push(ResponseIssue::Truncated);
        }
        if metrics.has_structure < thresholds.min_structure {
            issues.push(ResponseIssue::MissingStructure);
        }
        if metrics.token_count > thresholds.max_tokens {
            issues.push(ResponseIssue::TokenLimitExceeded);
        }
        issues
    }
}

/// Completeness from length, up to 60 points.
fn length_points(text: &str) -> f64 {
    let chars = text.trim().chars().count().min(COMPLETE_LENGTH_CHARS);
    chars as f64 / COMPLETE_LENGTH_CHARS as f64 * 60.0
}

/// Completeness from expected section markers, up to 40 points.
fn marker_points(text: &str, language: Language) -> f64 {
    let markers = language.strings().section_markers;
    if markers.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let found = markers.iter().filter(|m| lowered.contains(*m)).count();
    found as f64 / markers.len() as f64 * 40.0
}

/// Headings 40, numbered lines 30, bulleted lines 30; a JSON object scores 100.
fn structure_score(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.starts_with('{')
        && serde_json::from_str::<serde_json::Value>(trimmed)
            .map(|v| v.is_object())
            .unwrap_or(false)
    {
        return 100.0;
    }

    let heading = HEADING_REGEX.get_or_init(|| Regex::new(r"(?m)^\s*#{1,6}\s+\S").unwrap());
    let numbered = NUMBERED_REGEX.get_or_init(|| Regex::new(r"(?m)^\s*\d+[.)]\s+\S").unwrap());
    let bullet = BULLET_REGEX.get_or_init(|| Regex::new(r"(?m)^\s*[-*•]\s+\S").unwrap());

    let mut score = 0.0;
    if heading.is_match(text) {
        score += 40.0;
    }
    if numbered.is_match(text) {
        score += 30.0;
    }
    if bullet.is_match(text) {
        score += 30.0;
    }
    score
}

/// True unless the text ends with terminal punctuation and not with an ellipsis.
pub fn is_truncated(text: &str) -> bool {
    let trimmed = text.trim_end();
    if trimmed.ends_with("...") || trimmed.ends_with('…') {
        return true;
    }
    match trimmed.chars().last() {
        Some(last) => !TERMINAL_PUNCTUATION.contains(&last),
        None => true,
    }
}
