//! End-to-end tests through the public API.
//!
//! These exercise the whole request flow: language resolution, template
//! serving from real storage backends, response review and correction.

use prompt_consistency::config::Config;
use prompt_consistency::error::ErrorCode;
use prompt_consistency::i18n::{
    Language, LanguageContext, LanguageResolver, LanguageSource, ResolverSignals,
};
use prompt_consistency::orchestrator::{report, ConsistencyOrchestrator, RequestHeaders, Stores};
use prompt_consistency::parser::parse;
use prompt_consistency::prompts::repository::combine_with_context;
use prompt_consistency::prompts::validator::IssueCode;
use prompt_consistency::prompts::{
    PromptType, PromptValidator, StableTemplateRegistry, TemplateSource,
};
use prompt_consistency::quality::{ResponseIssue, ResponseQualityAnalyzer};
use prompt_consistency::storage::{InMemoryStore, PreferenceStore, LOCAL_PREFERENCE_KEY};
use prompt_consistency::ErrorClassifier;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

// ==================== Test Helpers ====================

fn stable_content(kind: PromptType, language: Language) -> String {
    StableTemplateRegistry::new()
        .get(kind, language)
        .expect("Should have a stable reference")
        .content
        .clone()
}

/// Orchestrator over one in-memory store backing every storage trait.
fn in_memory_orchestrator() -> (ConsistencyOrchestrator, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    let stores = Stores {
        templates: store.clone(),
        translations: store.clone(),
        preferences: store.clone(),
        local_preferences: store.clone(),
    };
    (
        ConsistencyOrchestrator::with_stores(stores, &Config::default()),
        store,
    )
}

/// Template directory with the given prompt files and a `common` translation domain.
fn template_dir(files: &[(Language, PromptType, String)]) -> TempDir {
    let dir = TempDir::new().expect("Should create temp dir");
    for (language, kind, content) in files {
        let lang_dir = dir.path().join("prompts").join(language.code());
        std::fs::create_dir_all(&lang_dir).expect("Should create prompt dir");
        std::fs::write(lang_dir.join(kind.filename()), content).expect("Should write prompt");
    }

    let locales = dir.path().join("locales").join("en");
    std::fs::create_dir_all(&locales).expect("Should create locale dir");
    std::fs::write(
        locales.join("common.json"),
        json!({ "greeting": "Hello, {name}!" }).to_string(),
    )
    .expect("Should write translations");
    dir
}

// ==================== Language Resolution Tests ====================

#[tokio::test]
async fn test_unsupported_language_resolves_to_default() {
    let (orchestrator, _) = in_memory_orchestrator();

    let context = orchestrator
        .resolve_for_request(
            &RequestHeaders::new()
                .with_content_language("fr")
                .with_accept_language("de-DE, es;q=0.5"),
            &ResolverSignals::default().with_browser_languages(["zh-CN"]),
        )
        .await;

    assert_eq!(context.response_language, Language::RUSSIAN);
    assert_eq!(context.source, LanguageSource::Default);
}

#[tokio::test]
async fn test_local_preference_beats_browser_hint() {
    let store = Arc::new(InMemoryStore::new());
    store
        .save_language(LOCAL_PREFERENCE_KEY, "ru")
        .await
        .expect("Should save local preference");
    let resolver = LanguageResolver::new(
        store.clone(),
        store,
        Arc::new(ErrorClassifier::default()),
        Language::RUSSIAN,
    );

    let resolved = resolver
        .resolve(&ResolverSignals::default().with_browser_languages(["en-US"]))
        .await;

    assert_eq!(resolved.language, Language::RUSSIAN);
    assert_eq!(resolved.source, LanguageSource::UserPreference);
    assert_eq!(resolved.confidence, 0.9);
}

#[tokio::test]
async fn test_saved_user_preference_survives_restart() {
    let dir = TempDir::new().expect("Should create temp dir");
    let config = Config {
        preference_file: Some(dir.path().join("preferences.json")),
        ..Config::default()
    };

    let first = ConsistencyOrchestrator::from_config(&config).expect("Should wire pipeline");
    first
        .resolver()
        .save_preference(&ResolverSignals::for_user("42"), Language::ENGLISH)
        .await
        .expect("Should persist preference");

    let second = ConsistencyOrchestrator::from_config(&config).expect("Should wire pipeline");
    let context = second
        .resolve_for_request(
            &RequestHeaders::new(),
            &ResolverSignals::for_user("42").with_browser_languages(["ru-RU"]),
        )
        .await;

    assert_eq!(context.response_language, Language::ENGLISH);
    assert_eq!(context.source, LanguageSource::UserPreference);
    assert_eq!(context.confidence, 1.0);
}

#[tokio::test]
async fn test_users_resolve_independently() {
    let orchestrator =
        ConsistencyOrchestrator::from_config(&Config::default()).expect("Should wire pipeline");
    orchestrator
        .resolver()
        .save_preference(&ResolverSignals::for_user("alice"), Language::ENGLISH)
        .await
        .expect("Should persist preference");

    let bob = orchestrator
        .resolve_for_request(
            &RequestHeaders::new(),
            &ResolverSignals::for_user("bob").with_browser_languages(["ru-RU"]),
        )
        .await;
    let alice = orchestrator
        .resolve_for_request(&RequestHeaders::new(), &ResolverSignals::for_user("alice"))
        .await;

    assert_eq!(bob.response_language, Language::RUSSIAN);
    assert_eq!(bob.source, LanguageSource::Browser);
    assert_eq!(bob.confidence, 0.7);
    assert_eq!(alice.response_language, Language::ENGLISH);
    assert_eq!(alice.confidence, 1.0);
}

#[tokio::test]
async fn test_client_choice_stays_with_that_client() {
    let (orchestrator, _) = in_memory_orchestrator();
    orchestrator
        .resolver()
        .save_preference(
            &ResolverSignals::for_user("alice").with_client("laptop"),
            Language::ENGLISH,
        )
        .await
        .expect("Should persist preference");

    let same_client = orchestrator
        .resolve_for_request(
            &RequestHeaders::new(),
            &ResolverSignals::default().with_client("laptop"),
        )
        .await;
    let other_client = orchestrator
        .resolve_for_request(
            &RequestHeaders::new(),
            &ResolverSignals::for_user("bob")
                .with_client("phone")
                .with_browser_languages(["ru"]),
        )
        .await;

    assert_eq!(same_client.response_language, Language::ENGLISH);
    assert_eq!(same_client.confidence, 0.9);
    assert_eq!(other_client.response_language, Language::RUSSIAN);
    assert_eq!(other_client.source, LanguageSource::Browser);
}

// ==================== Template Serving Tests ====================

#[tokio::test]
async fn test_templates_served_over_http() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/prompts/ru/main-prompt.txt"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(stable_content(PromptType::Main, Language::RUSSIAN)),
        )
        .mount(&mock_server)
        .await;

    let config = Config {
        template_base_url: Some(mock_server.uri()),
        ..Config::default()
    };
    let orchestrator = ConsistencyOrchestrator::from_config(&config).expect("Should wire pipeline");
    let context = LanguageContext::for_language(Language::RUSSIAN);

    let prepared = orchestrator
        .prepare_prompt(PromptType::Main, &context, None, &[])
        .await;
    let hypotheses = orchestrator
        .prepare_prompt(PromptType::Hypotheses, &context, None, &[])
        .await;

    assert_eq!(prepared.template.metadata.source, TemplateSource::Requested);
    assert!(prepared.template.metadata.is_stable);
    // Missing on the server, served from the stable reference
    assert_eq!(hypotheses.template.metadata.source, TemplateSource::Stable);
    assert!(orchestrator
        .errors()
        .recent()
        .iter()
        .any(|e| e.code == ErrorCode::TemplateNotFound));
}

#[tokio::test]
async fn test_unreachable_storage_still_serves_every_kind() {
    let (orchestrator, store) = in_memory_orchestrator();
    store.set_unreachable(true);

    for language in Language::all() {
        for kind in PromptType::ALL {
            let template = orchestrator.repository().get(kind, language).await;
            assert!(
                !template.content.trim().is_empty(),
                "{:?}/{} was empty",
                kind,
                language
            );
        }
    }
    assert!(orchestrator
        .errors()
        .recent()
        .iter()
        .any(|e| e.code == ErrorCode::NetworkConnectionFailed));
}

#[tokio::test]
async fn test_fallback_language_template_from_directory() {
    let dir = template_dir(&[(
        Language::RUSSIAN,
        PromptType::AbTest,
        stable_content(PromptType::AbTest, Language::RUSSIAN),
    )]);
    let config = Config {
        template_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    let orchestrator = ConsistencyOrchestrator::from_config(&config).expect("Should wire pipeline");

    let template = orchestrator
        .repository()
        .get(PromptType::AbTest, Language::ENGLISH)
        .await;

    // No English file, so the Russian one is served
    assert_eq!(template.metadata.source, TemplateSource::FallbackLanguage);
    assert_eq!(template.language, Language::RUSSIAN);

    let russian = orchestrator
        .repository()
        .get(PromptType::AbTest, Language::RUSSIAN)
        .await;
    assert_eq!(russian.metadata.source, TemplateSource::Requested);
}

#[tokio::test]
async fn test_translations_from_directory() {
    let dir = template_dir(&[]);
    let config = Config {
        template_dir: Some(dir.path().to_path_buf()),
        ..Config::default()
    };
    let orchestrator = ConsistencyOrchestrator::from_config(&config).expect("Should wire pipeline");
    let context = LanguageContext::for_language(Language::ENGLISH);

    let greeting = orchestrator
        .translate(&context, "common.greeting", &[("name", "Ada")])
        .await;
    let missing = orchestrator.translate(&context, "common.farewell", &[]).await;

    assert_eq!(greeting, "Hello, Ada!");
    assert_eq!(missing, "common.farewell");
}

// ==================== Validation Scenario Tests ====================

#[test]
fn test_empty_and_short_prompts_are_invalid() {
    let validator = PromptValidator::default();

    let empty = validator.validate("", PromptType::Main, Language::RUSSIAN);
    assert!(!empty.is_valid);
    assert!(empty.has_issue(IssueCode::EmptyPrompt));

    let short = validator.validate("Плохой промпт", PromptType::Main, Language::RUSSIAN);
    assert!(!short.is_valid);
    assert!(short.score < 50);
    assert!(short.has_issue(IssueCode::TooShort));
}

#[test]
fn test_validation_is_repeatable() {
    let validator = PromptValidator::default();
    let content = stable_content(PromptType::JsonStructured, Language::ENGLISH);

    let first = validator.validate(&content, PromptType::JsonStructured, Language::ENGLISH);
    let second = validator.validate(&content, PromptType::JsonStructured, Language::ENGLISH);

    assert_eq!(first, second);
}

#[test]
fn test_reference_is_similar_to_itself() {
    let stable = StableTemplateRegistry::new();
    let content = stable_content(PromptType::BusinessAnalytics, Language::RUSSIAN);

    let report = stable
        .similarity_to(&content, PromptType::BusinessAnalytics, Language::RUSSIAN)
        .expect("Should have a reference");

    assert!((report.score - 100.0).abs() < 1e-9);
    assert!(report.is_valid);
}

#[test]
fn test_short_russian_response_scores_low() {
    let metrics = ResponseQualityAnalyzer::new()
        .measure_quality("Интерфейс в целом неплох, но", Language::RUSSIAN);

    assert!(metrics.is_truncated);
    assert!(metrics.quality_score < 50.0);
}

#[test]
fn test_truncated_json_is_recovered() {
    assert_eq!(parse(r#"{"a":1,"b":[1,2"#), Some(json!({"a": 1, "b": [1, 2]})));
}

#[test]
fn test_context_merge_respects_cap() {
    let context = "б".repeat(5000);

    let combined = combine_with_context("Промпт", &context, Language::RUSSIAN, 2000);

    assert!(combined.contains(&format!("{}...", "б".repeat(2000))));
    assert!(!combined.contains(&"б".repeat(2001)));
}

// ==================== Review Flow Tests ====================

#[tokio::test]
async fn test_inconsistent_response_corrects_next_attempt() {
    let (orchestrator, _) = in_memory_orchestrator();
    let context = orchestrator
        .resolve_for_request(
            &RequestHeaders::new().with_accept_language("ru-RU,ru;q=0.9,en;q=0.8"),
            &ResolverSignals::default(),
        )
        .await;
    assert_eq!(context.response_language, Language::RUSSIAN);

    let first = orchestrator
        .prepare_prompt(PromptType::Main, &context, Some("Мобильное приложение банка"), &[])
        .await;

    // The model answered in English and stopped mid-sentence
    let review = orchestrator.review_response(
        "The onboarding screen has several issues, for example the",
        &context,
        &first.content,
    );
    assert!(review.validation.has_issue(ResponseIssue::LanguageMismatch));
    assert!(review.validation.has_issue(ResponseIssue::Truncated));
    assert!(review.should_retry());

    let corrected = review.correction.expect("Should correct the template");
    assert!(corrected.corrected.contains("ЯЗЫК ОТВЕТА"));
    assert!(corrected.corrected.contains("ПОЛНОТА ОТВЕТА"));
    assert!(corrected.quality_improvement > 0.0);

    // Preparing the retry from the observed issues produces the same directives
    let retry = orchestrator
        .prepare_prompt(
            PromptType::Main,
            &context,
            Some("Мобильное приложение банка"),
            &review.validation.issues,
        )
        .await;
    assert_eq!(retry.content, corrected.corrected);

    let summary = report(&[review.validation]);
    assert_eq!(summary.passed, 0);
    assert_eq!(summary.languages[&Language::RUSSIAN].responses, 1);
}

#[tokio::test]
async fn test_structured_response_flow() {
    let (orchestrator, _) = in_memory_orchestrator();
    let context = LanguageContext::for_language(Language::ENGLISH);

    let prepared = orchestrator
        .prepare_prompt(PromptType::JsonStructured, &context, None, &[])
        .await;
    assert!(!prepared.template.content.is_empty());

    let raw = "```json\n{\"screenDescription\": {\"pageType\": \"checkout\", \"userGoal\": \"pay for the order\"}, \"problemsAndSolutions\": [{\"problem\": \"hidden fees\", \"solution\": \"show the total early";
    let validation = orchestrator.validate_structured_response(raw, &context);

    let parsed = validation.structured.as_ref().expect("Should parse analysis");
    assert!(parsed.recovered_fields.contains(&"problemsAndSolutions".to_string()));
    assert!(!parsed.is_complete());
    assert!(validation.has_issue(ResponseIssue::MalformedJson));
    assert_eq!(validation.detected_language, Some(Language::ENGLISH));
    assert!(!validation.is_consistent);
}
