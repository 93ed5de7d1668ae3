//! Prompt template validation.
//!
//! Five independent checks each subtract a penalty from a starting score of
//! 100. A template is valid when the final score is at least 70 and no check
//! raised an error. Validation is pure: no clock, no I/O.

use crate::i18n::{Language, LanguageClassifier, ScriptRatioClassifier};
use crate::prompts::kind::PromptType;
use crate::prompts::stable::{StableTemplateRegistry, SIMILARITY_THRESHOLD};
use crate::quality::estimate_tokens;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{Arc, OnceLock};

pub const MIN_PROMPT_CHARS: usize = 100;
pub const MAX_PROMPT_CHARS: usize = 50_000;
pub const MIN_PROMPT_TOKENS: usize = 25;
pub const MAX_PROMPT_TOKENS: usize = 8_000;
pub const PASSING_SCORE: u32 = 70;

/// Length above which a prompt without any visible structure gets a hint.
const UNSTRUCTURED_HINT_CHARS: usize = 500;

/// Maximum penalty of the similarity check.
const MAX_SIMILARITY_PENALTY: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Error,
    Warning,
    Info,
}

/// Closed set of validation issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueCode {
    EmptyPrompt,
    TooShort,
    TooLong,
    MissingInstructions,
    MissingStructure,
    UnknownLanguage,
    LanguageMismatch,
    MissingRequiredKeywords,
    MissingJsonFields,
    MissingNoMarkdownClause,
    TokenCountOutOfRange,
    LowSimilarity,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::EmptyPrompt => "empty-prompt",
            IssueCode::TooShort => "too-short",
            IssueCode::TooLong => "too-long",
            IssueCode::MissingInstructions => "missing-instructions",
            IssueCode::MissingStructure => "missing-structure",
            IssueCode::UnknownLanguage => "unknown-language",
            IssueCode::LanguageMismatch => "language-mismatch",
            IssueCode::MissingRequiredKeywords => "missing-required-keywords",
            IssueCode::MissingJsonFields => "missing-json-fields",
            IssueCode::MissingNoMarkdownClause => "missing-no-markdown-clause",
            IssueCode::TokenCountOutOfRange => "token-count-out-of-range",
            IssueCode::LowSimilarity => "low-similarity",
        }
    }

    /// Fixed advice shown for this code.
    pub fn recommendation(&self) -> &'static str {
        match self {
            IssueCode::EmptyPrompt => "Provide the prompt text.",
            IssueCode::TooShort => "Expand the prompt with the task, the expected sections and the output format.",
            IssueCode::TooLong => "Shorten the prompt; move reference material into the business context.",
            IssueCode::MissingInstructions => "State the task explicitly (for example \"Analyze the interface...\").",
            IssueCode::MissingStructure => "Split the prompt into lines or a numbered list of expected sections.",
            IssueCode::UnknownLanguage => "Write the prompt in one supported language.",
            IssueCode::LanguageMismatch => "Translate the prompt into the requested language.",
            IssueCode::MissingRequiredKeywords => "Mention the subject matter this prompt kind is expected to cover.",
            IssueCode::MissingJsonFields => "List every field of the JSON output by name.",
            IssueCode::MissingNoMarkdownClause => "Tell the model not to wrap the JSON in markdown.",
            IssueCode::TokenCountOutOfRange => "Keep the prompt between 25 and 8000 tokens.",
            IssueCode::LowSimilarity => "Align the prompt with the stable reference template.",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    pub code: IssueCode,
    pub message: String,
    /// 1 (cosmetic) to 10 (unusable)
    pub severity: u8,
}

impl ValidationIssue {
    fn new(kind: IssueKind, code: IssueCode, severity: u8, message: impl Into<String>) -> Self {
        Self {
            kind,
            code,
            message: message.into(),
            severity,
        }
    }
}

/// The five checks, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValidationCheck {
    Structure,
    Language,
    TypeSpecific,
    TokenBounds,
    Similarity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationMetadata {
    pub kind: PromptType,
    pub expected_language: Language,
    pub detected_language: Option<Language>,
    pub char_count: usize,
    pub token_count: usize,
    /// Similarity ratio to the stable reference, when one exists
    pub similarity: Option<f64>,
    pub penalties: BTreeMap<ValidationCheck, u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// 0-100
    pub score: u32,
    pub issues: Vec<ValidationIssue>,
    /// Advice for each distinct issue code, ordered by code
    pub recommendations: Vec<String>,
    pub metadata: ValidationMetadata,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(|i| i.kind == IssueKind::Error)
    }

    pub fn has_issue(&self, code: IssueCode) -> bool {
        self.issues.iter().any(|i| i.code == code)
    }

    pub fn codes(&self) -> BTreeSet<IssueCode> {
        self.issues.iter().map(|i| i.code).collect()
    }
}

/// Issues and the penalty of one check.
#[derive(Debug, Default)]
struct CheckOutcome {
    issues: Vec<ValidationIssue>,
    penalty: u32,
}

impl CheckOutcome {
    fn push(&mut self, issue: ValidationIssue, penalty: u32) {
        self.issues.push(issue);
        self.penalty += penalty;
    }
}

/// Validates prompt templates before they are cached or sent.
#[derive(Clone)]
pub struct PromptValidator {
    stable: Arc<StableTemplateRegistry>,
    classifier: Arc<dyn LanguageClassifier>,
}

impl PromptValidator {
    pub fn new(stable: Arc<StableTemplateRegistry>, classifier: Arc<dyn LanguageClassifier>) -> Self {
        Self { stable, classifier }
    }

    pub fn validate(&self, content: &str, kind: PromptType, expected: Language) -> ValidationResult {
        let char_count = content.chars().count();
        let token_count = estimate_tokens(content);
        let detection = self.classifier.detect(content);
        let similarity = self
            .stable
            .similarity_to(content, kind, expected)
            .map(|report| report.similarity);

        let outcomes = [
            (ValidationCheck::Structure, check_structure(content, char_count)),
            (
                ValidationCheck::Language,
                check_language(detection.language, expected),
            ),
            (
                ValidationCheck::TypeSpecific,
                check_type_specific(content, kind, expected),
            ),
            (ValidationCheck::TokenBounds, check_token_bounds(token_count)),
            (ValidationCheck::Similarity, check_similarity(similarity)),
        ];

        let mut issues = Vec::new();
        let mut penalties = BTreeMap::new();
        let mut total_penalty = 0u32;
        for (check, outcome) in outcomes {
            total_penalty += outcome.penalty;
            penalties.insert(check, outcome.penalty);
            issues.extend(outcome.issues);
        }

        let score = 100u32.saturating_sub(total_penalty);
        let has_errors = issues.iter().any(|i| i.kind == IssueKind::Error);
        let recommendations = issues
            .iter()
            .map(|i| i.code)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .map(|code| code.recommendation().to_string())
            .collect();

        ValidationResult {
            is_valid: score >= PASSING_SCORE && !has_errors,
            score,
            issues,
            recommendations,
            metadata: ValidationMetadata {
                kind,
                expected_language: expected,
                detected_language: detection.language,
                char_count,
                token_count,
                similarity,
                penalties,
            },
        }
    }

    /// Cheap pre-check: long enough and mentions at least one required keyword
    /// of `kind` in any supported language.
    pub fn quick_validate(&self, content: &str, kind: PromptType) -> bool {
        if content.chars().count() < MIN_PROMPT_CHARS {
            return false;
        }
        let lowered = content.to_lowercase();
        Language::all().into_iter().any(|language| {
            kind.required_keywords(language)
                .iter()
                .any(|keyword| lowered.contains(keyword))
        })
    }
}

impl Default for PromptValidator {
    fn default() -> Self {
        Self::new(
            Arc::new(StableTemplateRegistry::new()),
            Arc::new(ScriptRatioClassifier),
        )
    }
}

static LIST_MARKER_REGEX: OnceLock<Regex> = OnceLock::new();

fn list_marker_regex() -> &'static Regex {
    LIST_MARKER_REGEX.get_or_init(|| Regex::new(r"(?m)(^\s*[-*•]\s)|(\d+[.)]\s)").unwrap())
}

fn check_structure(content: &str, char_count: usize) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();

    if content.trim().is_empty() {
        outcome.push(
            ValidationIssue::new(IssueKind::Error, IssueCode::EmptyPrompt, 10, "Prompt is empty"),
            50,
        );
        return outcome;
    }

    if char_count < MIN_PROMPT_CHARS {
        outcome.push(
            ValidationIssue::new(
                IssueKind::Error,
                IssueCode::TooShort,
                8,
                format!("Prompt has {} characters, minimum is {}", char_count, MIN_PROMPT_CHARS),
            ),
            30,
        );
    } else if char_count > MAX_PROMPT_CHARS {
        outcome.push(
            ValidationIssue::new(
                IssueKind::Warning,
                IssueCode::TooLong,
                5,
                format!("Prompt has {} characters, maximum is {}", char_count, MAX_PROMPT_CHARS),
            ),
            10,
        );
    }

    let lowered = content.to_lowercase();
    let has_instruction = Language::all().into_iter().any(|language| {
        language
            .strings()
            .instruction_keywords
            .iter()
            .any(|keyword| lowered.contains(keyword))
    });
    if !has_instruction {
        outcome.push(
            ValidationIssue::new(
                IssueKind::Warning,
                IssueCode::MissingInstructions,
                6,
                "Prompt does not state an analysis task",
            ),
            15,
        );
    }

    if char_count > UNSTRUCTURED_HINT_CHARS
        && !content.contains('\n')
        && !list_marker_regex().is_match(content)
    {
        outcome.push(
            ValidationIssue::new(
                IssueKind::Info,
                IssueCode::MissingStructure,
                2,
                "Long prompt has no line breaks, lists or numbering",
            ),
            5,
        );
    }

    outcome
}

fn check_language(detected: Option<Language>, expected: Language) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    match detected {
        None => outcome.push(
            ValidationIssue::new(
                IssueKind::Warning,
                IssueCode::UnknownLanguage,
                5,
                "Could not determine the prompt language",
            ),
            10,
        ),
        Some(language) if language != expected => outcome.push(
            ValidationIssue::new(
                IssueKind::Error,
                IssueCode::LanguageMismatch,
                9,
                format!("Prompt is written in {}, expected {}", language, expected),
            ),
            40,
        ),
        Some(_) => {}
    }
    outcome
}

fn check_type_specific(content: &str, kind: PromptType, language: Language) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();

    let missing = kind.missing_keywords(content, language);
    if !missing.is_empty() {
        outcome.push(
            ValidationIssue::new(
                IssueKind::Error,
                IssueCode::MissingRequiredKeywords,
                8,
                format!("Missing required keywords for {}: {}", kind, missing.join(", ")),
            ),
            10 * missing.len() as u32,
        );
    }

    if kind.expects_structured_output() {
        let missing_fields = kind.missing_output_fields(content);
        if !missing_fields.is_empty() {
            outcome.push(
                ValidationIssue::new(
                    IssueKind::Error,
                    IssueCode::MissingJsonFields,
                    7,
                    format!("Missing output fields: {}", missing_fields.join(", ")),
                ),
                5 * missing_fields.len() as u32,
            );
        }

        if !has_no_markdown_clause(content) {
            outcome.push(
                ValidationIssue::new(
                    IssueKind::Warning,
                    IssueCode::MissingNoMarkdownClause,
                    5,
                    "Structured prompt does not forbid markdown wrapping",
                ),
                10,
            );
        }
    }

    outcome
}

/// Whether some line mentions markdown together with a negation.
pub fn has_no_markdown_clause(content: &str) -> bool {
    let negations: Vec<&str> = Language::all()
        .into_iter()
        .flat_map(|language| language.strings().markdown_negations.iter().copied())
        .collect();

    content.lines().any(|line| {
        let lowered = format!("{} ", line.to_lowercase());
        lowered.contains("markdown") && negations.iter().any(|n| lowered.contains(n))
    })
}

fn check_token_bounds(token_count: usize) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    if !(MIN_PROMPT_TOKENS..=MAX_PROMPT_TOKENS).contains(&token_count) {
        outcome.push(
            ValidationIssue::new(
                IssueKind::Warning,
                IssueCode::TokenCountOutOfRange,
                4,
                format!(
                    "Estimated {} tokens, expected {}-{}",
                    token_count, MIN_PROMPT_TOKENS, MAX_PROMPT_TOKENS
                ),
            ),
            5,
        );
    }
    outcome
}

fn check_similarity(similarity: Option<f64>) -> CheckOutcome {
    let mut outcome = CheckOutcome::default();
    if let Some(ratio) = similarity {
        if ratio < SIMILARITY_THRESHOLD {
            let penalty = (((SIMILARITY_THRESHOLD - ratio) * 50.0).round() as u32)
                .min(MAX_SIMILARITY_PENALTY);
            outcome.push(
                ValidationIssue::new(
                    IssueKind::Warning,
                    IssueCode::LowSimilarity,
                    4,
                    format!("Similarity to the stable template is {:.0}%", ratio * 100.0),
                ),
                penalty,
            );
        }
    }
    outcome
}
