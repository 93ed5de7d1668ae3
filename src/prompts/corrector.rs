//! Template auto-correction.
//!
//! Observed response issues are mapped onto four correction categories. Each
//! category appends a localized directive block headed by a marker; a template
//! that already carries the marker is left alone, so correcting twice changes
//! nothing. Whitespace and duplicate-line cleanup runs on every correction.

use crate::i18n::interpolate;
use crate::i18n::{Language, LanguageContext};
use crate::quality::ResponseIssue;
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CorrectionCategory {
    LanguageEnforcement,
    CompletenessFix,
    StructureImprovement,
    TokenOptimization,
}

impl CorrectionCategory {
    /// Category that addresses `issue`.
    pub fn for_issue(issue: ResponseIssue) -> CorrectionCategory {
        match issue {
            ResponseIssue::LanguageMismatch | ResponseIssue::LowLanguageAccuracy => {
                CorrectionCategory::LanguageEnforcement
            }
            ResponseIssue::Incomplete | ResponseIssue::Truncated => {
                CorrectionCategory::CompletenessFix
            }
            ResponseIssue::MissingStructure | ResponseIssue::MalformedJson => {
                CorrectionCategory::StructureImprovement
            }
            ResponseIssue::TokenLimitExceeded => CorrectionCategory::TokenOptimization,
        }
    }

    fn impact(&self) -> CorrectionImpact {
        match self {
            CorrectionCategory::LanguageEnforcement | CorrectionCategory::CompletenessFix => {
                CorrectionImpact::High
            }
            CorrectionCategory::StructureImprovement => CorrectionImpact::Medium,
            CorrectionCategory::TokenOptimization => CorrectionImpact::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrectionImpact {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionRecord {
    pub category: CorrectionCategory,
    pub description: String,
    /// False when the template already addressed the category
    pub applied: bool,
    pub impact: CorrectionImpact,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectionResult {
    pub corrected: String,
    pub corrections: Vec<CorrectionRecord>,
    /// Change of the correction score between original and corrected text
    pub quality_improvement: f64,
}

impl CorrectionResult {
    pub fn applied_count(&self) -> usize {
        self.corrections.iter().filter(|c| c.applied).count()
    }

    pub fn changed(&self) -> bool {
        self.applied_count() > 0
    }
}

/// Rewrites templates to address observed response issues. Stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoCorrector;

impl AutoCorrector {
    pub fn new() -> Self {
        Self
    }

    pub fn correct(
        &self,
        template: &str,
        context: &LanguageContext,
        issues: &[ResponseIssue],
    ) -> CorrectionResult {
        let categories: BTreeSet<CorrectionCategory> =
            issues.iter().copied().map(CorrectionCategory::for_issue).collect();

        let mut corrected = template.to_string();
        let mut corrections = Vec::new();

        for category in &categories {
            if *category != CorrectionCategory::TokenOptimization {
                corrections.push(append_directive(&mut corrected, *category, context));
            }
        }

        let optimized = optimize_whitespace(&corrected);
        let saved = corrected
            .chars()
            .count()
            .saturating_sub(optimized.chars().count());
        if optimized != corrected {
            corrections.push(CorrectionRecord {
                category: CorrectionCategory::TokenOptimization,
                description: format!("Removed {} redundant characters", saved),
                applied: true,
                impact: CorrectionImpact::Low,
            });
            corrected = optimized;
        } else if categories.contains(&CorrectionCategory::TokenOptimization) {
            corrections.push(CorrectionRecord {
                category: CorrectionCategory::TokenOptimization,
                description: "Template has no redundant whitespace or duplicate lines".to_string(),
                applied: false,
                impact: CorrectionImpact::Low,
            });
        }

        let quality_improvement = correction_score(&corrected, context.prompt_language)
            - correction_score(template, context.prompt_language);

        let result = CorrectionResult {
            corrected,
            corrections,
            quality_improvement,
        };
        if result.changed() {
            info!(
                "Applied {} template corrections (+{:.0} points)",
                result.applied_count(),
                result.quality_improvement
            );
        }
        result
    }

    /// Correct from free-text issue descriptions, classified by keyword.
    /// Descriptions matching no category are ignored.
    pub fn correct_descriptions(
        &self,
        template: &str,
        context: &LanguageContext,
        descriptions: &[String],
    ) -> CorrectionResult {
        let issues: Vec<ResponseIssue> = descriptions
            .iter()
            .filter_map(|description| {
                let issue = classify_description(description);
                if issue.is_none() {
                    debug!("Unclassified issue description: {}", description);
                }
                issue
            })
            .collect();
        self.correct(template, context, &issues)
    }

    /// Reduced single pass for an imminent retry: only the language and
    /// completeness directives, no cleanup.
    pub fn apply_emergency_correction(&self, template: &str, context: &LanguageContext) -> CorrectionResult {
        let mut corrected = template.to_string();
        let corrections = vec![
            append_directive(&mut corrected, CorrectionCategory::LanguageEnforcement, context),
            append_directive(&mut corrected, CorrectionCategory::CompletenessFix, context),
        ];
        let quality_improvement = correction_score(&corrected, context.prompt_language)
            - correction_score(template, context.prompt_language);

        CorrectionResult {
            corrected,
            corrections,
            quality_improvement,
        }
    }
}

/// Append the directive block of `category` unless its marker is present.
fn append_directive(
    template: &mut String,
    category: CorrectionCategory,
    context: &LanguageContext,
) -> CorrectionRecord {
    let strings = context.prompt_language.strings();
    let (marker, directive) = match category {
        CorrectionCategory::LanguageEnforcement => (
            strings.language_marker,
            interpolate(
                strings.language_directive,
                &[("language", language_label(context.response_language, context.prompt_language))],
            ),
        ),
        CorrectionCategory::CompletenessFix => {
            (strings.completeness_marker, strings.completeness_directive.to_string())
        }
        CorrectionCategory::StructureImprovement => {
            (strings.structure_marker, strings.structure_directive.to_string())
        }
        CorrectionCategory::TokenOptimization => {
            return CorrectionRecord {
                category,
                description: "Token optimization has no directive".to_string(),
                applied: false,
                impact: CorrectionImpact::Low,
            }
        }
    };

    if template.contains(marker) {
        return CorrectionRecord {
            category,
            description: format!("{} directive already present", marker),
            applied: false,
            impact: category.impact(),
        };
    }

    if !template.trim_end().is_empty() {
        template.truncate(template.trim_end().len());
        template.push_str("\n\n");
    }
    template.push_str(&format!("### {}\n{}", marker, directive));

    CorrectionRecord {
        category,
        description: format!("Added {} directive", marker),
        applied: true,
        impact: category.impact(),
    }
}

/// Name of `language` as written in prompts of `prompt_language`.
fn language_label(language: Language, prompt_language: Language) -> &'static str {
    if language == prompt_language {
        language.native_name()
    } else {
        language.name()
    }
}

fn classify_description(description: &str) -> Option<ResponseIssue> {
    const LANGUAGE: &[&str] = &["language", "язык", "english", "russian", "англ", "русск"];
    const COMPLETENESS: &[&str] = &["incomplete", "truncat", "cut off", "неполн", "обрыв", "оборван"];
    const STRUCTURE: &[&str] = &["structure", "format", "json", "markdown", "структур", "формат"];
    const TOKENS: &[&str] = &["token", "too long", "length", "токен", "длин"];

    let lowered = description.to_lowercase();
    let matches = |keywords: &[&str]| keywords.iter().any(|k| lowered.contains(k));

    if matches(LANGUAGE) {
        Some(ResponseIssue::LanguageMismatch)
    } else if matches(COMPLETENESS) {
        Some(ResponseIssue::Incomplete)
    } else if matches(STRUCTURE) {
        Some(ResponseIssue::MissingStructure)
    } else if matches(TOKENS) {
        Some(ResponseIssue::TokenLimitExceeded)
    } else {
        None
    }
}

/// Collapse repeated spaces, trim line ends, collapse blank-line runs and
/// drop exact duplicates of lines that contain letters.
pub fn optimize_whitespace(text: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut previous_blank = true;

    for line in text.lines() {
        let line = collapse_spaces(line);
        if line.is_empty() {
            if !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
            continue;
        }

        if line.chars().any(char::is_alphabetic) && !seen.insert(line.trim_start().to_string()) {
            continue;
        }
        previous_blank = false;
        lines.push(line);
    }

    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

/// Keep leading indentation, collapse inner runs of spaces and tabs, trim the end.
fn collapse_spaces(line: &str) -> String {
    let body = line.trim_start();
    let indent = &line[..line.len() - body.len()];

    let mut out = String::with_capacity(line.len());
    out.push_str(indent);
    let mut previous_space = false;
    for c in body.trim_end().chars() {
        if c == ' ' || c == '\t' {
            if !previous_space {
                out.push(' ');
            }
            previous_space = true;
        } else {
            out.push(c);
            previous_space = false;
        }
    }
    if out.trim().is_empty() {
        out.clear();
    }
    out
}

/// Correction score: 40 base, +20 language directive, +20 completeness
/// directive, +10 structure directive, +10 clean whitespace.
pub fn correction_score(template: &str, language: Language) -> f64 {
    let strings = language.strings();
    let mut score = 40.0;
    if template.contains(strings.language_marker) {
        score += 20.0;
    }
    if template.contains(strings.completeness_marker) {
        score += 20.0;
    }
    if template.contains(strings.structure_marker) {
        score += 10.0;
    }
    if optimize_whitespace(template) == template {
        score += 10.0;
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn russian_context() -> LanguageContext {
        LanguageContext::for_language(Language::RUSSIAN)
    }

    const TEMPLATE: &str = "Проанализируй интерфейс и дай рекомендации по UX.\n1. Опиши экран.\n2. Перечисли проблемы.";

    // ==================== Category Tests ====================

    #[test]
    fn test_every_issue_maps_to_a_category() {
        use CorrectionCategory::*;
        let expected = [
            (ResponseIssue::LanguageMismatch, LanguageEnforcement),
            (ResponseIssue::LowLanguageAccuracy, LanguageEnforcement),
            (ResponseIssue::Incomplete, CompletenessFix),
            (ResponseIssue::Truncated, CompletenessFix),
            (ResponseIssue::MissingStructure, StructureImprovement),
            (ResponseIssue::MalformedJson, StructureImprovement),
            (ResponseIssue::TokenLimitExceeded, TokenOptimization),
        ];
        for (issue, category) in expected {
            assert_eq!(CorrectionCategory::for_issue(issue), category);
        }
    }

    #[test]
    fn test_classify_description() {
        assert_eq!(
            classify_description("Response language does not match"),
            Some(ResponseIssue::LanguageMismatch)
        );
        assert_eq!(
            classify_description("Ответ оборван на середине"),
            Some(ResponseIssue::Incomplete)
        );
        assert_eq!(
            classify_description("Invalid JSON format"),
            Some(ResponseIssue::MissingStructure)
        );
        assert_eq!(
            classify_description("Too many tokens"),
            Some(ResponseIssue::TokenLimitExceeded)
        );
        assert_eq!(classify_description("something odd"), None);
    }

    // ==================== Directive Tests ====================

    #[test]
    fn test_language_issue_adds_directive() {
        let result = AutoCorrector::new().correct(
            TEMPLATE,
            &russian_context(),
            &[ResponseIssue::LanguageMismatch],
        );

        assert!(result.corrected.contains("### ЯЗЫК ОТВЕТА"));
        assert!(result.corrected.contains(Language::RUSSIAN.native_name()));
        assert_eq!(result.applied_count(), 1);
        assert_eq!(result.corrections[0].impact, CorrectionImpact::High);
        assert_eq!(result.quality_improvement, 20.0);
    }

    #[test]
    fn test_correction_is_idempotent() {
        let corrector = AutoCorrector::new();
        let issues = [
            ResponseIssue::LanguageMismatch,
            ResponseIssue::Truncated,
            ResponseIssue::MalformedJson,
        ];

        let first = corrector.correct(TEMPLATE, &russian_context(), &issues);
        let second = corrector.correct(&first.corrected, &russian_context(), &issues);

        assert_eq!(first.applied_count(), 3);
        assert_eq!(second.corrected, first.corrected);
        assert!(second.corrections.iter().all(|c| !c.applied));
        assert_eq!(second.quality_improvement, 0.0);
    }

    #[test]
    fn test_english_context_uses_english_directives() {
        let context = LanguageContext::for_language(Language::ENGLISH);
        let result = AutoCorrector::new().correct(
            "Analyze the UX of the screen.",
            &context,
            &[ResponseIssue::Incomplete],
        );

        assert!(result.corrected.ends_with(Language::ENGLISH.strings().completeness_directive));
        assert!(result.corrected.contains("### RESPONSE COMPLETENESS"));
    }

    #[test]
    fn test_no_issues_only_cleans_whitespace() {
        let result = AutoCorrector::new().correct(
            "Проанализируй   экран.  \n\n\n\nДай рекомендации.",
            &russian_context(),
            &[],
        );

        assert_eq!(result.corrected, "Проанализируй экран.\n\nДай рекомендации.");
        assert_eq!(result.corrections.len(), 1);
        assert_eq!(result.corrections[0].category, CorrectionCategory::TokenOptimization);
        assert_eq!(result.quality_improvement, 10.0);
    }

    #[test]
    fn test_token_issue_without_waste_is_recorded_unapplied() {
        let result = AutoCorrector::new().correct(
            TEMPLATE,
            &russian_context(),
            &[ResponseIssue::TokenLimitExceeded],
        );

        assert_eq!(result.corrected, TEMPLATE);
        assert_eq!(result.corrections.len(), 1);
        assert!(!result.corrections[0].applied);
    }

    #[test]
    fn test_correct_descriptions() {
        let result = AutoCorrector::new().correct_descriptions(
            TEMPLATE,
            &russian_context(),
            &["Ответ на неправильном языке".to_string(), "???".to_string()],
        );

        assert!(result.corrected.contains("ЯЗЫК ОТВЕТА"));
        assert_eq!(result.applied_count(), 1);
    }

    // ==================== Emergency Correction Tests ====================

    #[test]
    fn test_emergency_correction_adds_language_and_completeness_only() {
        let result = AutoCorrector::new().apply_emergency_correction(TEMPLATE, &russian_context());

        assert!(result.corrected.contains("ЯЗЫК ОТВЕТА"));
        assert!(result.corrected.contains("ПОЛНОТА ОТВЕТА"));
        assert!(!result.corrected.contains("СТРУКТУРА ОТВЕТА"));
        assert_eq!(result.applied_count(), 2);
        assert_eq!(result.quality_improvement, 40.0);
    }

    // ==================== Whitespace Tests ====================

    #[test]
    fn test_optimize_whitespace() {
        let text = "  indented   line  \nsame line\nsame line\n\n\n---\n---\n\nend\t\t";
        assert_eq!(
            optimize_whitespace(text),
            "  indented line\nsame line\n\n---\n---\n\nend"
        );
    }

    #[test]
    fn test_optimize_whitespace_keeps_clean_text() {
        assert_eq!(optimize_whitespace(TEMPLATE), TEMPLATE);
    }
}
