//! Prompt template loading, caching and fallback.
//!
//! Templates are loaded per language as a batch of every prompt kind. A
//! language has at most one load in flight: concurrent callers await the same
//! load. `get` always produces a template, falling back from the requested
//! language to the fallback language, the stable reference and finally a
//! built-in template.

use crate::error::{ErrorClassifier, ErrorCode, ResourceKind};
use crate::i18n::Language;
use crate::metrics::PipelineMetrics;
use crate::prompts::builtin::builtin_template;
use crate::prompts::kind::PromptType;
use crate::prompts::stable::StableTemplateRegistry;
use crate::prompts::validator::PromptValidator;
use crate::quality::estimate_tokens;
use crate::storage::TemplateStore;
use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

pub const DEFAULT_CONTEXT_CAP: usize = 2000;
pub const DEFAULT_TEMPLATE_TTL_HOURS: i64 = 24;

/// Suffix appended to business context cut at the cap.
const TRUNCATION_MARKER: &str = "...";

/// Which fallback tier produced a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TemplateSource {
    /// Loaded from storage in the requested language
    Requested,
    /// Loaded from storage in the configured fallback language
    FallbackLanguage,
    /// Curated stable reference
    Stable,
    /// Minimal template compiled into the crate
    BuiltIn,
}

impl TemplateSource {
    /// Fallback order of template strategies.
    pub const ORDER: [TemplateSource; 4] = [
        TemplateSource::Requested,
        TemplateSource::FallbackLanguage,
        TemplateSource::Stable,
        TemplateSource::BuiltIn,
    ];
}

impl fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TemplateSource::Requested => "requested",
            TemplateSource::FallbackLanguage => "fallback-language",
            TemplateSource::Stable => "stable",
            TemplateSource::BuiltIn => "built-in",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateMetadata {
    pub version: String,
    pub token_count: usize,
    /// Content is the stable reference (loaded verbatim or substituted)
    pub is_stable: bool,
    /// Hex SHA-256 of the content
    pub content_hash: String,
    pub loaded_at: DateTime<Utc>,
    pub source: TemplateSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptTemplate {
    pub kind: PromptType,
    /// Language of `content`, which differs from the requested language when
    /// the fallback language served it
    pub language: Language,
    pub content: String,
    pub metadata: TemplateMetadata,
    pub last_validated_at: Option<DateTime<Utc>>,
}

impl PromptTemplate {
    #[allow(clippy::too_many_arguments)]
    fn new(
        kind: PromptType,
        language: Language,
        content: String,
        version: &str,
        is_stable: bool,
        source: TemplateSource,
        loaded_at: DateTime<Utc>,
        last_validated_at: Option<DateTime<Utc>>,
    ) -> Self {
        let metadata = TemplateMetadata {
            version: version.to_string(),
            token_count: estimate_tokens(&content),
            is_stable,
            content_hash: content_hash(&content),
            loaded_at,
            source,
        };
        Self {
            kind,
            language,
            content,
            metadata,
            last_validated_at,
        }
    }
}

/// Hex-encoded SHA-256 of `content`.
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub fallback_language: Language,
    /// Age after which a loaded batch is dropped and reloaded
    pub ttl: Duration,
    /// Maximum characters of business context merged into a prompt
    pub context_cap: usize,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            fallback_language: Language::default_language(),
            ttl: Duration::hours(DEFAULT_TEMPLATE_TTL_HOURS),
            context_cap: DEFAULT_CONTEXT_CAP,
        }
    }
}

/// One template as fetched and validated.
#[derive(Debug, Clone)]
struct LoadedEntry {
    content: String,
    is_valid: bool,
    validated_at: DateTime<Utc>,
}

/// Every kind of one language, loaded together.
#[derive(Debug)]
struct LanguageBatch {
    loaded_at: DateTime<Utc>,
    entries: HashMap<PromptType, LoadedEntry>,
}

impl LanguageBatch {
    fn is_stale(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.loaded_at > ttl
    }

    fn valid_entry(&self, kind: PromptType) -> Option<&LoadedEntry> {
        self.entries.get(&kind).filter(|entry| entry.is_valid)
    }
}

type BatchCell = Arc<OnceCell<Arc<LanguageBatch>>>;

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    /// Languages with a loaded batch
    pub languages: Vec<Language>,
    /// Templates fetched across loaded batches
    pub templates: usize,
    /// Templates that passed validation
    pub valid_templates: usize,
    pub oldest_loaded_at: Option<DateTime<Utc>>,
}

pub struct TemplateRepository {
    store: Arc<dyn TemplateStore>,
    validator: Arc<PromptValidator>,
    stable: Arc<StableTemplateRegistry>,
    errors: Arc<ErrorClassifier>,
    metrics: Arc<PipelineMetrics>,
    config: RepositoryConfig,
    batches: Mutex<HashMap<Language, BatchCell>>,
}

impl TemplateRepository {
    pub fn new(
        store: Arc<dyn TemplateStore>,
        validator: Arc<PromptValidator>,
        stable: Arc<StableTemplateRegistry>,
        errors: Arc<ErrorClassifier>,
        metrics: Arc<PipelineMetrics>,
        config: RepositoryConfig,
    ) -> Self {
        Self {
            store,
            validator,
            stable,
            errors,
            metrics,
            config,
            batches: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    /// Template for (kind, language). Never fails.
    ///
    /// Strategies are tried in [`TemplateSource::ORDER`]; the first that
    /// produces a template wins.
    pub async fn get(&self, kind: PromptType, language: Language) -> PromptTemplate {
        for source in TemplateSource::ORDER {
            if let Some(template) = self.try_source(source, kind, language).await {
                self.metrics.record_served(source);
                return template;
            }
        }
        self.metrics.record_served(TemplateSource::BuiltIn);
        self.builtin(kind, language)
    }

    /// Run a single fallback strategy.
    pub async fn try_source(
        &self,
        source: TemplateSource,
        kind: PromptType,
        language: Language,
    ) -> Option<PromptTemplate> {
        match source {
            TemplateSource::Requested => {
                self.from_storage(kind, language, TemplateSource::Requested)
                    .await
            }
            TemplateSource::FallbackLanguage => {
                let fallback = self.config.fallback_language;
                if fallback == language {
                    return None;
                }
                let template = self
                    .from_storage(kind, fallback, TemplateSource::FallbackLanguage)
                    .await?;
                warn!(
                    "Serving {} template in fallback language {} instead of {}",
                    kind, fallback, language
                );
                Some(template)
            }
            TemplateSource::Stable => {
                let template = self.from_stable(kind, language)?;
                warn!("Serving stable {} template for {}", kind, language);
                Some(template)
            }
            TemplateSource::BuiltIn => Some(self.builtin(kind, language)),
        }
    }

    /// Templates of every kind for `language`, in kind order.
    pub async fn get_all(&self, language: Language) -> Vec<PromptTemplate> {
        let mut templates = Vec::with_capacity(PromptType::ALL.len());
        for kind in PromptType::ALL {
            templates.push(self.get(kind, language).await);
        }
        templates
    }

    /// Load the batches of several languages concurrently.
    pub async fn preload(&self, languages: &[Language]) {
        join_all(languages.iter().map(|language| self.batch(*language))).await;
    }

    /// Drop the cached batch of `language` and load it again.
    pub async fn force_reload(&self, language: Language) {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&language);
        info!("Reloading prompt templates for {}", language);
        self.batch(language).await;
    }

    /// Drop every cached batch of this repository.
    pub fn clear_cache(&self) {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
        debug!("Template cache cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        let batches: Vec<(Language, Arc<LanguageBatch>)> = self
            .batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter_map(|(language, cell)| cell.get().map(|batch| (*language, batch.clone())))
            .collect();

        let mut languages: Vec<Language> = batches.iter().map(|(language, _)| *language).collect();
        languages.sort();

        CacheStats {
            languages,
            templates: batches.iter().map(|(_, b)| b.entries.len()).sum(),
            valid_templates: batches
                .iter()
                .map(|(_, b)| b.entries.values().filter(|e| e.is_valid).count())
                .sum(),
            oldest_loaded_at: batches.iter().map(|(_, b)| b.loaded_at).min(),
        }
    }

    /// Append business context under a localized heading.
    ///
    /// Context longer than the cap is cut and marked with `...`.
    pub fn combine_with_context(&self, prompt: &str, extra_context: &str, language: Language) -> String {
        combine_with_context(prompt, extra_context, language, self.config.context_cap)
    }

    fn builtin(&self, kind: PromptType, language: Language) -> PromptTemplate {
        self.errors.classify(
            ErrorCode::TemplateNotFound,
            format!("no template available for {}/{}, using built-in", language, kind),
            Some(language),
        );
        PromptTemplate::new(
            kind,
            language,
            builtin_template(kind, language),
            "builtin",
            false,
            TemplateSource::BuiltIn,
            Utc::now(),
            None,
        )
    }

    async fn from_storage(
        &self,
        kind: PromptType,
        language: Language,
        source: TemplateSource,
    ) -> Option<PromptTemplate> {
        let batch = self.batch(language).await;
        let entry = batch.valid_entry(kind)?;
        let is_stable = self.stable.is_stable_content(kind, language, &entry.content);
        let version = if is_stable {
            self.stable
                .get(kind, language)
                .map(|reference| reference.version.as_str())
                .unwrap_or("storage")
        } else {
            "storage"
        };

        Some(PromptTemplate::new(
            kind,
            language,
            entry.content.clone(),
            version,
            is_stable,
            source,
            batch.loaded_at,
            Some(entry.validated_at),
        ))
    }

    fn from_stable(&self, kind: PromptType, language: Language) -> Option<PromptTemplate> {
        let reference = self
            .stable
            .get(kind, language)
            .or_else(|| self.stable.get(kind, self.config.fallback_language))?;

        Some(PromptTemplate::new(
            kind,
            reference.language,
            reference.content.clone(),
            &reference.version,
            true,
            TemplateSource::Stable,
            Utc::now(),
            None,
        ))
    }

    /// The fresh batch of `language`, loading it when absent or stale.
    async fn batch(&self, language: Language) -> Arc<LanguageBatch> {
        let cell = self.batch_cell(language);
        if cell.initialized() {
            self.metrics.record_cache_hit();
        } else {
            self.metrics.record_cache_miss();
        }

        let batch = cell
            .get_or_init(|| self.load_batch(language))
            .await
            .clone();

        if !batch.is_stale(Utc::now(), self.config.ttl) {
            return batch;
        }

        info!(
            "Prompt templates for {} are older than {}h, reloading",
            language,
            self.config.ttl.num_hours()
        );
        {
            let mut batches = self.batches.lock().unwrap_or_else(|e| e.into_inner());
            if batches
                .get(&language)
                .is_some_and(|current| Arc::ptr_eq(current, &cell))
            {
                batches.remove(&language);
            }
        }

        let fresh = self.batch_cell(language);
        fresh
            .get_or_init(|| self.load_batch(language))
            .await
            .clone()
    }

    fn batch_cell(&self, language: Language) -> BatchCell {
        self.batches
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(language)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn load_batch(&self, language: Language) -> Arc<LanguageBatch> {
        info!(
            "Loading {} prompt templates for {}",
            PromptType::ALL.len(),
            language
        );

        let loads = PromptType::ALL
            .iter()
            .map(|kind| self.load_entry(*kind, language));
        let entries: HashMap<PromptType, LoadedEntry> = join_all(loads)
            .await
            .into_iter()
            .flatten()
            .collect();

        debug!(
            "Loaded {}/{} prompt templates for {}",
            entries.len(),
            PromptType::ALL.len(),
            language
        );

        Arc::new(LanguageBatch {
            loaded_at: Utc::now(),
            entries,
        })
    }

    async fn load_entry(&self, kind: PromptType, language: Language) -> Option<(PromptType, LoadedEntry)> {
        let content = match self.store.fetch_template(language, kind.filename()).await {
            Ok(content) => {
                self.metrics.record_template_load(true);
                content
            }
            Err(e) => {
                self.metrics.record_template_load(false);
                self.errors
                    .classify_store_error(ResourceKind::Template, &e, Some(language));
                return None;
            }
        };

        self.metrics.record_validation();
        let validation = self.validator.validate(&content, kind, language);
        if !validation.is_valid {
            let codes: Vec<&str> = validation.codes().iter().map(|c| c.as_str()).collect();
            self.errors.classify(
                ErrorCode::TemplateInvalidFormat,
                format!(
                    "{}/{} scored {} ({})",
                    language,
                    kind.filename(),
                    validation.score,
                    codes.join(", ")
                ),
                Some(language),
            );
        }

        Some((
            kind,
            LoadedEntry {
                content,
                is_valid: validation.is_valid,
                validated_at: Utc::now(),
            },
        ))
    }
}

/// Append `extra_context` to `prompt` under a localized heading, cutting the
/// context at `cap` characters. Blank context leaves the prompt unchanged.
pub fn combine_with_context(prompt: &str, extra_context: &str, language: Language, cap: usize) -> String {
    let context = extra_context.trim();
    if context.is_empty() {
        return prompt.to_string();
    }

    let context = if context.chars().count() > cap {
        let mut cut: String = context.chars().take(cap).collect();
        cut.push_str(TRUNCATION_MARKER);
        cut
    } else {
        context.to_string()
    };

    let strings = language.strings();
    format!(
        "{}\n\n{}\n{}\n\n{}",
        prompt.trim_end(),
        strings.context_heading,
        context,
        strings.context_instruction
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use proptest::prelude::*;

    struct Fixture {
        store: Arc<InMemoryStore>,
        errors: Arc<ErrorClassifier>,
        metrics: Arc<PipelineMetrics>,
        repository: TemplateRepository,
    }

    fn fixture_with(store: Arc<InMemoryStore>, config: RepositoryConfig) -> Fixture {
        let stable = Arc::new(StableTemplateRegistry::new());
        let validator = Arc::new(PromptValidator::default());
        let errors = Arc::new(ErrorClassifier::default());
        let metrics = Arc::new(PipelineMetrics::new());
        let repository = TemplateRepository::new(
            store.clone(),
            validator,
            stable,
            errors.clone(),
            metrics.clone(),
            config,
        );
        Fixture {
            store,
            errors,
            metrics,
            repository,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(Arc::new(InMemoryStore::new()), RepositoryConfig::default())
    }

    fn reference(kind: PromptType, language: Language) -> String {
        StableTemplateRegistry::new()
            .get(kind, language)
            .expect("reference")
            .content
            .clone()
    }

    fn seed_language(store: &InMemoryStore, language: Language) {
        for kind in PromptType::ALL {
            store.insert_template(language, kind.filename(), reference(kind, language));
        }
    }

    // ==================== Tier Tests ====================

    #[tokio::test]
    async fn test_requested_language_from_storage() {
        let f = fixture();
        seed_language(&f.store, Language::ENGLISH);

        let template = f.repository.get(PromptType::Main, Language::ENGLISH).await;

        assert_eq!(template.metadata.source, TemplateSource::Requested);
        assert_eq!(template.language, Language::ENGLISH);
        assert!(template.metadata.is_stable, "content equals the reference");
        assert!(template.last_validated_at.is_some());
        assert_eq!(template.metadata.content_hash, content_hash(&template.content));
    }

    #[tokio::test]
    async fn test_custom_template_is_not_stable() {
        let f = fixture();
        let custom = format!(
            "{}\nДобавь раздел о мобильной версии экрана.",
            reference(PromptType::Main, Language::RUSSIAN)
        );
        f.store
            .insert_template(Language::RUSSIAN, PromptType::Main.filename(), custom.clone());

        let template = f.repository.get(PromptType::Main, Language::RUSSIAN).await;

        assert_eq!(template.metadata.source, TemplateSource::Requested);
        assert_eq!(template.content, custom);
        assert!(!template.metadata.is_stable);
        assert_eq!(template.metadata.version, "storage");
    }

    #[tokio::test]
    async fn test_falls_back_to_fallback_language() {
        let f = fixture();
        seed_language(&f.store, Language::RUSSIAN);

        let template = f.repository.get(PromptType::AbTest, Language::ENGLISH).await;

        assert_eq!(template.metadata.source, TemplateSource::FallbackLanguage);
        assert_eq!(template.language, Language::RUSSIAN);
    }

    #[tokio::test]
    async fn test_invalid_template_is_skipped() {
        let f = fixture();
        f.store
            .insert_template(Language::RUSSIAN, PromptType::Main.filename(), "Плохой промпт");

        let template = f.repository.get(PromptType::Main, Language::RUSSIAN).await;

        assert_eq!(template.metadata.source, TemplateSource::Stable);
        assert!(template.metadata.is_stable);
        assert!(f
            .errors
            .recent()
            .iter()
            .any(|e| e.code == ErrorCode::TemplateInvalidFormat));
    }

    #[tokio::test]
    async fn test_unreachable_storage_still_returns_content() {
        let f = fixture();
        f.store.set_unreachable(true);

        let template = f.repository.get(PromptType::Json, Language::RUSSIAN).await;

        assert!(!template.content.trim().is_empty());
        assert_eq!(template.metadata.source, TemplateSource::Stable);
        assert!(f
            .errors
            .recent()
            .iter()
            .any(|e| e.code == ErrorCode::NetworkConnectionFailed));
    }

    #[tokio::test]
    async fn test_builtin_when_nothing_else_exists() {
        let store = Arc::new(InMemoryStore::new());
        let errors = Arc::new(ErrorClassifier::default());
        let metrics = Arc::new(PipelineMetrics::new());
        let repository = TemplateRepository::new(
            store,
            Arc::new(PromptValidator::default()),
            Arc::new(StableTemplateRegistry::empty()),
            errors.clone(),
            metrics.clone(),
            RepositoryConfig::default(),
        );

        let template = repository.get(PromptType::Hypotheses, Language::ENGLISH).await;

        assert_eq!(template.metadata.source, TemplateSource::BuiltIn);
        assert!(!template.metadata.is_stable);
        assert!(!template.content.is_empty());
        assert_eq!(errors.last().map(|e| e.code), Some(ErrorCode::TemplateNotFound));
        assert_eq!(metrics.served(TemplateSource::BuiltIn), 1);
    }

    #[tokio::test]
    async fn test_each_strategy_independently() {
        let f = fixture();
        seed_language(&f.store, Language::RUSSIAN);
        let repo = &f.repository;

        let requested = repo
            .try_source(TemplateSource::Requested, PromptType::Main, Language::ENGLISH)
            .await;
        let fallback = repo
            .try_source(TemplateSource::FallbackLanguage, PromptType::Main, Language::ENGLISH)
            .await;
        let same_language = repo
            .try_source(TemplateSource::FallbackLanguage, PromptType::Main, Language::RUSSIAN)
            .await;
        let stable = repo
            .try_source(TemplateSource::Stable, PromptType::Main, Language::ENGLISH)
            .await;

        assert!(requested.is_none());
        assert_eq!(fallback.map(|t| t.language), Some(Language::RUSSIAN));
        assert!(same_language.is_none());
        assert_eq!(stable.map(|t| t.metadata.is_stable), Some(true));
    }

    // ==================== Caching Tests ====================

    #[tokio::test]
    async fn test_batch_loads_every_kind_once() {
        let f = fixture();
        seed_language(&f.store, Language::RUSSIAN);

        f.repository.get(PromptType::Main, Language::RUSSIAN).await;
        f.repository.get(PromptType::Json, Language::RUSSIAN).await;

        assert_eq!(f.store.fetch_count(), PromptType::ALL.len());
        assert_eq!(f.metrics.cache_misses(), 1);
        assert_eq!(f.metrics.cache_hits(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_load() {
        let store = Arc::new(InMemoryStore::new().with_latency(std::time::Duration::from_millis(20)));
        seed_language(&store, Language::RUSSIAN);
        let f = fixture_with(store, RepositoryConfig::default());

        let (first, second) = tokio::join!(
            f.repository.get(PromptType::Main, Language::RUSSIAN),
            f.repository.get(PromptType::Hypotheses, Language::RUSSIAN)
        );

        assert_eq!(first.metadata.source, TemplateSource::Requested);
        assert_eq!(second.metadata.source, TemplateSource::Requested);
        assert_eq!(f.store.fetch_count(), PromptType::ALL.len());
    }

    #[tokio::test]
    async fn test_stale_batch_is_reloaded() {
        let config = RepositoryConfig {
            ttl: Duration::milliseconds(50),
            ..RepositoryConfig::default()
        };
        let f = fixture_with(Arc::new(InMemoryStore::new()), config);
        seed_language(&f.store, Language::RUSSIAN);

        f.repository.get(PromptType::Main, Language::RUSSIAN).await;
        tokio::time::sleep(std::time::Duration::from_millis(120)).await;
        f.repository.get(PromptType::Main, Language::RUSSIAN).await;

        assert_eq!(f.store.fetch_count(), 2 * PromptType::ALL.len());
    }

    #[tokio::test]
    async fn test_force_reload_picks_up_new_content() {
        let f = fixture();
        seed_language(&f.store, Language::ENGLISH);
        f.repository.get(PromptType::Main, Language::ENGLISH).await;

        let updated = format!(
            "{}\nAlso assess the mobile layout.",
            reference(PromptType::Main, Language::ENGLISH)
        );
        f.store
            .insert_template(Language::ENGLISH, PromptType::Main.filename(), updated.clone());

        let cached = f.repository.get(PromptType::Main, Language::ENGLISH).await;
        assert_ne!(cached.content, updated);

        f.repository.force_reload(Language::ENGLISH).await;
        let reloaded = f.repository.get(PromptType::Main, Language::ENGLISH).await;
        assert_eq!(reloaded.content, updated);
    }

    #[tokio::test]
    async fn test_clear_cache_is_instance_local() {
        let store = Arc::new(InMemoryStore::new());
        seed_language(&store, Language::RUSSIAN);
        let first = fixture_with(store.clone(), RepositoryConfig::default());
        let second = fixture_with(store, RepositoryConfig::default());

        first.repository.preload(&[Language::RUSSIAN]).await;
        second.repository.preload(&[Language::RUSSIAN]).await;
        first.repository.clear_cache();

        assert!(first.repository.cache_stats().languages.is_empty());
        assert_eq!(second.repository.cache_stats().languages, vec![Language::RUSSIAN]);
    }

    #[tokio::test]
    async fn test_get_all_and_cache_stats() {
        let f = fixture();
        seed_language(&f.store, Language::ENGLISH);

        let templates = f.repository.get_all(Language::ENGLISH).await;
        let stats = f.repository.cache_stats();

        assert_eq!(templates.len(), PromptType::ALL.len());
        assert_eq!(stats.templates, PromptType::ALL.len());
        assert_eq!(stats.valid_templates, PromptType::ALL.len());
        assert!(stats.oldest_loaded_at.is_some());
    }

    // ==================== Context Merge Tests ====================

    #[test]
    fn test_combine_with_context_appends_localized_block() {
        let combined = combine_with_context("Промпт", "Интернет-магазин обуви", Language::RUSSIAN, 2000);

        assert!(combined.starts_with("Промпт\n\n## Дополнительный контекст\nИнтернет-магазин обуви"));
        assert!(combined.ends_with(Language::RUSSIAN.strings().context_instruction));
    }

    #[test]
    fn test_combine_with_context_caps_long_context() {
        let context = "x".repeat(2500);
        let combined = combine_with_context("Prompt", &context, Language::ENGLISH, 2000);

        let expected = format!("{}...", "x".repeat(2000));
        assert!(combined.contains(&expected));
        assert!(!combined.contains(&"x".repeat(2001)));
    }

    #[test]
    fn test_combine_with_blank_context() {
        assert_eq!(combine_with_context("Prompt", "   ", Language::ENGLISH, 2000), "Prompt");
    }

    proptest! {
        #[test]
        fn prop_combined_context_never_exceeds_cap(context in "[a-z ]{0,3000}", cap in 1usize..2500) {
            let combined = combine_with_context("P", &context, Language::ENGLISH, cap);
            let extra = combined.chars().count().saturating_sub(1);
            let overhead = "\n\n## Additional context\n".chars().count()
                + TRUNCATION_MARKER.len()
                + "\n\n".len()
                + Language::ENGLISH.strings().context_instruction.chars().count();
            prop_assert!(extra <= cap + overhead);
        }
    }
}
