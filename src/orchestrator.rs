//! Per-request coordination of language resolution, prompt preparation and
//! response review.
//!
//! The orchestrator never calls a model and never retries. It prepares the
//! prompt for an attempt and, after the caller has a response, decides
//! whether the response is consistent and what the template for the next
//! attempt should look like.

use crate::config::Config;
use crate::error::{ErrorClassifier, ErrorCode};
use crate::i18n::{
    normalize_tag, Language, LanguageClassifier, LanguageContext, LanguageResolver, LanguageSource,
    ResolverSignals, ScriptRatioClassifier, TranslationCatalog,
};
use crate::metrics::PipelineMetrics;
use crate::parser::{parse_analysis, ParseStrategy, ParsedAnalysis};
use crate::prompts::{
    AutoCorrector, CorrectionRecord, CorrectionResult, PromptTemplate, PromptType,
    PromptValidator, StableTemplateRegistry, TemplateRepository,
};
use crate::quality::{QualityMetrics, QualityThresholds, ResponseIssue, ResponseQualityAnalyzer};
use crate::storage::{
    FsStore, HttpStore, InMemoryStore, JsonFilePreferenceStore, PreferenceStore, TemplateStore,
    TranslationStore,
};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Confidence of a language taken from the content-language header.
pub const CONTENT_LANGUAGE_CONFIDENCE: f64 = 1.0;

/// Confidence of a language taken from the accept-language header.
pub const ACCEPT_LANGUAGE_CONFIDENCE: f64 = 0.8;

// ==================== Request Signals ====================

/// Language headers of an incoming request. Both are optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestHeaders {
    pub content_language: Option<String>,
    pub accept_language: Option<String>,
}

impl RequestHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_language(mut self, value: impl Into<String>) -> Self {
        self.content_language = Some(value.into());
        self
    }

    pub fn with_accept_language(mut self, value: impl Into<String>) -> Self {
        self.accept_language = Some(value.into());
        self
    }
}

/// Parse an accept-language header into normalized codes ordered by
/// descending quality. Entries with equal quality keep header order;
/// entries with `q=0` or an unparsable weight are dropped.
pub fn parse_accept_language(header: &str) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = header
        .split(',')
        .filter_map(|entry| {
            let mut parts = entry.split(';');
            let tag = parts.next()?.trim();
            if tag.is_empty() || tag == "*" {
                return None;
            }

            let mut quality = 1.0;
            for param in parts {
                if let Some(q) = param.trim().strip_prefix("q=") {
                    quality = q.trim().parse::<f64>().ok()?;
                }
            }
            (quality > 0.0).then(|| (normalize_tag(tag), quality.min(1.0)))
        })
        .collect();

    // Stable sort keeps header order among equal weights
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries
}

// ==================== Results ====================

/// A prompt ready to send for one attempt.
#[derive(Debug, Clone)]
pub struct PreparedPrompt {
    /// Template as served by the repository
    pub template: PromptTemplate,
    /// Final prompt text: template, merged context and corrections
    pub content: String,
    pub corrections: Vec<CorrectionRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponseValidation {
    pub is_consistent: bool,
    pub quality_score: f64,
    pub metrics: QualityMetrics,
    pub expected_language: Language,
    /// Dominant language of the response, detected independently
    pub detected_language: Option<Language>,
    pub issues: Vec<ResponseIssue>,
    /// Recovered analysis, for structured responses only
    pub structured: Option<ParsedAnalysis>,
}

impl ResponseValidation {
    pub fn has_issue(&self, issue: ResponseIssue) -> bool {
        self.issues.contains(&issue)
    }
}

/// Outcome of reviewing a response. `correction` is the template to use for
/// the next attempt; acting on it is up to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseReview {
    pub validation: ResponseValidation,
    pub correction: Option<CorrectionResult>,
}

impl ResponseReview {
    pub fn should_retry(&self) -> bool {
        !self.validation.is_consistent && self.correction.as_ref().is_some_and(|c| c.changed())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LanguageStats {
    pub responses: usize,
    pub passed: usize,
}

/// Aggregate over a set of response validations.
#[derive(Debug, Clone, Serialize)]
pub struct ConsistencyReport {
    pub total: usize,
    pub passed: usize,
    /// Pass rate as a percentage (0-100)
    pub pass_rate: f64,
    pub average_quality: f64,
    /// Issues by frequency, most common first
    pub common_issues: Vec<(ResponseIssue, usize)>,
    /// Results per expected response language
    pub languages: BTreeMap<Language, LanguageStats>,
}

/// Summarize validation results. Pure; nothing is stored.
pub fn report(results: &[ResponseValidation]) -> ConsistencyReport {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_consistent).count();

    let mut issue_counts: BTreeMap<ResponseIssue, usize> = BTreeMap::new();
    let mut languages: BTreeMap<Language, LanguageStats> = BTreeMap::new();
    for result in results {
        for issue in &result.issues {
            *issue_counts.entry(*issue).or_default() += 1;
        }
        let stats = languages.entry(result.expected_language).or_default();
        stats.responses += 1;
        if result.is_consistent {
            stats.passed += 1;
        }
    }

    let mut common_issues: Vec<(ResponseIssue, usize)> = issue_counts.into_iter().collect();
    common_issues.sort_by(|a, b| b.1.cmp(&a.1));

    let (pass_rate, average_quality) = if total > 0 {
        (
            passed as f64 / total as f64 * 100.0,
            results.iter().map(|r| r.quality_score).sum::<f64>() / total as f64,
        )
    } else {
        (0.0, 0.0)
    };

    ConsistencyReport {
        total,
        passed,
        pass_rate,
        average_quality,
        common_issues,
        languages,
    }
}

// ==================== Wiring ====================

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Produce a corrected template when a response is inconsistent
    pub auto_correct: bool,
    pub thresholds: QualityThresholds,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            auto_correct: true,
            thresholds: QualityThresholds::default(),
        }
    }
}

/// Storage backends selected from configuration.
#[derive(Clone)]
pub struct Stores {
    pub templates: Arc<dyn TemplateStore>,
    pub translations: Arc<dyn TranslationStore>,
    /// Per-user preferences, keyed by user id
    pub preferences: Arc<dyn PreferenceStore>,
    /// Per-client and installation-wide preferences
    pub local_preferences: Arc<dyn PreferenceStore>,
}

impl Stores {
    /// HTTP when a base URL is set, else the template directory, else an
    /// empty in-memory store (every template then falls back to the stable
    /// or built-in one).
    pub fn from_config(config: &Config) -> Result<Self> {
        let (templates, translations): (Arc<dyn TemplateStore>, Arc<dyn TranslationStore>) =
            if let Some(base_url) = &config.template_base_url {
                info!("Using HTTP template storage at {}", base_url);
                let store = Arc::new(
                    HttpStore::with_timeout(base_url.clone(), config.http_timeout())
                        .context("Failed to create HTTP template store")?,
                );
                (store.clone(), store)
            } else if let Some(dir) = &config.template_dir {
                info!("Using template directory {}", dir.display());
                let store = Arc::new(FsStore::new(dir.clone()));
                (store.clone(), store)
            } else {
                warn!("No template storage configured, serving stable and built-in templates only");
                let store = Arc::new(InMemoryStore::new());
                (store.clone(), store)
            };

        let preferences: Arc<dyn PreferenceStore> = match &config.preference_file {
            Some(path) => Arc::new(JsonFilePreferenceStore::new(path.clone())),
            None => Arc::new(InMemoryStore::new()),
        };

        Ok(Self {
            templates,
            translations,
            preferences,
            local_preferences: Arc::new(InMemoryStore::new()),
        })
    }
}

// ==================== Orchestrator ====================

pub struct ConsistencyOrchestrator {
    resolver: Arc<LanguageResolver>,
    repository: Arc<TemplateRepository>,
    catalog: Arc<TranslationCatalog>,
    classifier: Arc<dyn LanguageClassifier>,
    analyzer: ResponseQualityAnalyzer,
    corrector: AutoCorrector,
    errors: Arc<ErrorClassifier>,
    metrics: Arc<PipelineMetrics>,
    config: OrchestratorConfig,
}

impl ConsistencyOrchestrator {
    pub fn new(
        resolver: Arc<LanguageResolver>,
        repository: Arc<TemplateRepository>,
        catalog: Arc<TranslationCatalog>,
        classifier: Arc<dyn LanguageClassifier>,
        errors: Arc<ErrorClassifier>,
        metrics: Arc<PipelineMetrics>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            resolver,
            repository,
            catalog,
            classifier,
            analyzer: ResponseQualityAnalyzer::new(),
            corrector: AutoCorrector::new(),
            errors,
            metrics,
            config,
        }
    }

    /// Wire a complete pipeline over the given stores.
    pub fn with_stores(stores: Stores, config: &Config) -> Self {
        let errors = Arc::new(ErrorClassifier::new(config.error_log_capacity));
        let metrics = Arc::new(PipelineMetrics::new());
        let classifier: Arc<dyn LanguageClassifier> = Arc::new(ScriptRatioClassifier);
        let stable = Arc::new(StableTemplateRegistry::new());
        let validator = Arc::new(PromptValidator::new(stable.clone(), classifier.clone()));

        let resolver = Arc::new(LanguageResolver::new(
            stores.preferences,
            stores.local_preferences,
            errors.clone(),
            config.default_language,
        ));
        let repository = Arc::new(TemplateRepository::new(
            stores.templates,
            validator,
            stable,
            errors.clone(),
            metrics.clone(),
            config.repository_config(),
        ));
        let catalog = Arc::new(TranslationCatalog::new(
            stores.translations,
            errors.clone(),
            metrics.clone(),
            config.fallback_language,
        ));

        Self::new(
            resolver,
            repository,
            catalog,
            classifier,
            errors,
            metrics,
            OrchestratorConfig {
                auto_correct: config.auto_correct,
                thresholds: config.quality_thresholds(),
            },
        )
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let stores = Stores::from_config(config)?;
        Ok(Self::with_stores(stores, config))
    }

    pub fn repository(&self) -> &TemplateRepository {
        &self.repository
    }

    pub fn resolver(&self) -> &LanguageResolver {
        &self.resolver
    }

    pub fn errors(&self) -> &ErrorClassifier {
        &self.errors
    }

    pub fn metrics(&self) -> &PipelineMetrics {
        &self.metrics
    }

    /// Language context for a request: content-language header, then the
    /// accept-language header, then stored preferences and browser hints.
    pub async fn resolve_for_request(
        &self,
        headers: &RequestHeaders,
        signals: &ResolverSignals,
    ) -> LanguageContext {
        if let Some(value) = &headers.content_language {
            match Language::from_tag(value) {
                Some(language) => {
                    debug!("Language {} from content-language header", language);
                    return request_context(language, LanguageSource::RequestHeader, CONTENT_LANGUAGE_CONFIDENCE);
                }
                None => {
                    self.errors.classify(
                        ErrorCode::LanguageUnsupported,
                        format!("content-language '{}'", value),
                        None,
                    );
                }
            }
        }

        if let Some(header) = &headers.accept_language {
            let supported = parse_accept_language(header)
                .into_iter()
                .find_map(|(code, _)| Language::from_code(&code).ok());
            if let Some(language) = supported {
                debug!("Language {} from accept-language header", language);
                return request_context(language, LanguageSource::Browser, ACCEPT_LANGUAGE_CONFIDENCE);
            }
        }

        LanguageContext::from_resolved(self.resolver.resolve(signals).await)
    }

    /// Template for `kind` in the context's prompt language, with optional
    /// business context merged in and corrections for issues seen on
    /// earlier attempts.
    pub async fn prepare_prompt(
        &self,
        kind: PromptType,
        context: &LanguageContext,
        extra_context: Option<&str>,
        known_issues: &[ResponseIssue],
    ) -> PreparedPrompt {
        let template = self.repository.get(kind, context.prompt_language).await;

        let mut content = match extra_context {
            Some(extra) => self
                .repository
                .combine_with_context(&template.content, extra, context.prompt_language),
            None => template.content.clone(),
        };

        let mut corrections = Vec::new();
        if !known_issues.is_empty() && self.config.auto_correct {
            let result = self.corrector.correct(&content, context, known_issues);
            self.metrics.record_corrections(result.applied_count());
            content = result.corrected;
            corrections = result.corrections;
        }

        PreparedPrompt {
            template,
            content,
            corrections,
        }
    }

    /// Score a free-text response against the context's response language.
    pub fn validate_response(&self, text: &str, context: &LanguageContext) -> ResponseValidation {
        let metrics = self.analyzer.measure_quality(text, context.response_language);
        self.finish_validation(text, context, metrics, None)
    }

    /// Score a JSON response. Parsing always yields an analysis; anything
    /// short of a strict parse is reported as malformed JSON.
    pub fn validate_structured_response(&self, text: &str, context: &LanguageContext) -> ResponseValidation {
        let parsed = parse_analysis(text);
        let prose = recovered_prose(&parsed);
        let metrics = self
            .analyzer
            .measure_quality_structured(
                text,
                &prose,
                parsed.recovered_fields.len(),
                context.response_language,
            );
        self.finish_validation(&prose, context, metrics, Some(parsed))
    }

    /// Validate a response and, when it is inconsistent and auto-correction
    /// is enabled, correct `template` for the next attempt.
    pub fn review_response(&self, text: &str, context: &LanguageContext, template: &str) -> ResponseReview {
        let validation = self.validate_response(text, context);
        self.review(validation, context, template)
    }

    pub fn review_structured_response(
        &self,
        text: &str,
        context: &LanguageContext,
        template: &str,
    ) -> ResponseReview {
        let validation = self.validate_structured_response(text, context);
        self.review(validation, context, template)
    }

    /// Translate a UI key into the context's response language.
    pub async fn translate(&self, context: &LanguageContext, key: &str, params: &[(&str, &str)]) -> String {
        self.catalog.translate(context.response_language, key, params).await
    }

    fn review(&self, validation: ResponseValidation, context: &LanguageContext, template: &str) -> ResponseReview {
        let correction = if !validation.is_consistent && self.config.auto_correct {
            let result = self.corrector.correct(template, context, &validation.issues);
            self.metrics.record_corrections(result.applied_count());
            Some(result)
        } else {
            None
        };

        ResponseReview {
            validation,
            correction,
        }
    }

    /// Detect the response language, merge issues and decide consistency.
    /// `detection_text` is what the language is detected on.
    fn finish_validation(
        &self,
        detection_text: &str,
        context: &LanguageContext,
        metrics: QualityMetrics,
        structured: Option<ParsedAnalysis>,
    ) -> ResponseValidation {
        let expected = context.response_language;
        let detection = self.classifier.detect(detection_text);

        let mut issues = Vec::new();
        match detection.language {
            Some(detected) if detected != expected => {
                info!("Response language {} does not match expected {}", detected, expected);
                issues.push(ResponseIssue::LanguageMismatch);
            }
            None if detection.letters > 0 => {
                self.errors.classify(
                    ErrorCode::LanguageDetectionFailed,
                    format!("no dominant language in {} letters", detection.letters),
                    Some(expected),
                );
            }
            _ => {}
        }
        issues.extend(self.analyzer.issues(&metrics, &self.config.thresholds));
        if structured
            .as_ref()
            .is_some_and(|parsed| parsed.strategy != ParseStrategy::Strict)
        {
            issues.push(ResponseIssue::MalformedJson);
        }

        let is_consistent =
            issues.is_empty() && metrics.quality_score >= self.config.thresholds.min_quality_score;
        self.metrics.record_response(is_consistent);

        ResponseValidation {
            is_consistent,
            quality_score: metrics.quality_score,
            metrics,
            expected_language: expected,
            detected_language: detection.language,
            issues,
            structured,
        }
    }
}

fn request_context(language: Language, source: LanguageSource, confidence: f64) -> LanguageContext {
    LanguageContext {
        request_language: Some(language),
        detected_language: None,
        prompt_language: language,
        response_language: language,
        source,
        confidence,
        is_consistent: true,
    }
}

/// String leaves of the fields recovered from the response, one per line.
fn recovered_prose(parsed: &ParsedAnalysis) -> String {
    let mut leaves = Vec::new();
    for field in &parsed.recovered_fields {
        if let Some(value) = parsed.value.get(field) {
            collect_strings(value, &mut leaves);
        }
    }
    leaves.join("\n")
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.push(s),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        _ => {}
    }
}
