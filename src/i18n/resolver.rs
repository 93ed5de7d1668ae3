//! Per-request language resolution.
//!
//! Tiers are tried in order and the first that yields a supported language
//! wins. A failing tier (storage error, unsupported stored code) is
//! classified and skipped; resolution itself never fails.

use crate::error::{ErrorClassifier, ErrorCode, PipelineError, ResourceKind};
use crate::i18n::language::{normalize_tag, Language};
use crate::storage::{PreferenceStore, LOCAL_PREFERENCE_KEY};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// Where a resolved language came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LanguageSource {
    UserPreference,
    Browser,
    Default,
    RequestHeader,
}

/// One step of the resolution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// Preference persisted for the signed-in user
    UserPreference,
    /// Preference persisted locally (per installation or session)
    LocalPreference,
    /// Client language list, e.g. from the browser
    Browser,
    Default,
}

impl ResolutionTier {
    pub const ALL: [ResolutionTier; 4] = [
        ResolutionTier::UserPreference,
        ResolutionTier::LocalPreference,
        ResolutionTier::Browser,
        ResolutionTier::Default,
    ];

    pub fn confidence(&self) -> f64 {
        match self {
            ResolutionTier::UserPreference => 1.0,
            ResolutionTier::LocalPreference => 0.9,
            ResolutionTier::Browser => 0.7,
            ResolutionTier::Default => 0.5,
        }
    }

    pub fn source(&self) -> LanguageSource {
        match self {
            ResolutionTier::UserPreference | ResolutionTier::LocalPreference => {
                LanguageSource::UserPreference
            }
            ResolutionTier::Browser => LanguageSource::Browser,
            ResolutionTier::Default => LanguageSource::Default,
        }
    }
}

/// Inputs available when resolving a language.
#[derive(Debug, Clone, Default)]
pub struct ResolverSignals {
    pub user_id: Option<String>,
    /// Browser, device or session the request comes from
    pub client_id: Option<String>,
    /// Client language tags in preference order (e.g. `["en-US", "ru"]`)
    pub browser_languages: Vec<String>,
}

impl ResolverSignals {
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    pub fn with_client(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Key of the local preference for these signals.
    ///
    /// A client id scopes it to that client. Without one, only anonymous
    /// requests share the installation-wide key; a known user without a
    /// client id has no local preference.
    pub fn local_key(&self) -> Option<String> {
        match (&self.client_id, &self.user_id) {
            (Some(client_id), _) => Some(format!("client:{}", client_id)),
            (None, None) => Some(LOCAL_PREFERENCE_KEY.to_string()),
            (None, Some(_)) => None,
        }
    }

    pub fn with_browser_languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.browser_languages = languages.into_iter().map(Into::into).collect();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResolvedLanguage {
    pub language: Language,
    pub source: LanguageSource,
    /// 0.0-1.0
    pub confidence: f64,
}

/// Language decisions for one request. Built fresh per request, never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageContext {
    /// Language the request asked for, when it asked explicitly
    pub request_language: Option<Language>,
    /// Language detected from request content, when detection ran
    pub detected_language: Option<Language>,
    /// Language of the prompt template
    pub prompt_language: Language,
    /// Language the response must be written in
    pub response_language: Language,
    pub source: LanguageSource,
    pub confidence: f64,
    /// Prompt and response languages agree
    pub is_consistent: bool,
}

impl LanguageContext {
    /// Context serving everything in one resolved language.
    pub fn from_resolved(resolved: ResolvedLanguage) -> Self {
        Self {
            request_language: None,
            detected_language: None,
            prompt_language: resolved.language,
            response_language: resolved.language,
            source: resolved.source,
            confidence: resolved.confidence,
            is_consistent: true,
        }
    }

    pub fn for_language(language: Language) -> Self {
        Self::from_resolved(ResolvedLanguage {
            language,
            source: LanguageSource::Default,
            confidence: ResolutionTier::Default.confidence(),
        })
    }
}

/// Resolves the language to serve from stored preferences and client hints.
pub struct LanguageResolver {
    user_store: Arc<dyn PreferenceStore>,
    local_store: Arc<dyn PreferenceStore>,
    errors: Arc<ErrorClassifier>,
    default_language: Language,
    tiers: Vec<ResolutionTier>,
}

impl LanguageResolver {
    pub fn new(
        user_store: Arc<dyn PreferenceStore>,
        local_store: Arc<dyn PreferenceStore>,
        errors: Arc<ErrorClassifier>,
        default_language: Language,
    ) -> Self {
        Self {
            user_store,
            local_store,
            errors,
            default_language,
            tiers: ResolutionTier::ALL.to_vec(),
        }
    }

    /// Replace the tier order.
    pub fn with_tiers(mut self, tiers: Vec<ResolutionTier>) -> Self {
        self.tiers = tiers;
        self
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    /// Resolve the language for a request. Deterministic for identical
    /// signals and stored preferences.
    pub async fn resolve(&self, signals: &ResolverSignals) -> ResolvedLanguage {
        for tier in &self.tiers {
            if let Some(language) = self.try_tier(*tier, signals).await {
                debug!(
                    "Resolved language {} from {:?} (confidence {})",
                    language,
                    tier,
                    tier.confidence()
                );
                return ResolvedLanguage {
                    language,
                    source: tier.source(),
                    confidence: tier.confidence(),
                };
            }
        }

        info!(
            "No resolution tier produced a language, using default {}",
            self.default_language
        );
        ResolvedLanguage {
            language: self.default_language,
            source: LanguageSource::Default,
            confidence: 0.0,
        }
    }

    async fn try_tier(&self, tier: ResolutionTier, signals: &ResolverSignals) -> Option<Language> {
        match tier {
            ResolutionTier::UserPreference => {
                let user_id = signals.user_id.as_deref()?;
                self.load_stored(self.user_store.as_ref(), &user_key(user_id))
                    .await
            }
            ResolutionTier::LocalPreference => {
                let key = signals.local_key()?;
                self.load_stored(self.local_store.as_ref(), &key).await
            }
            ResolutionTier::Browser => supported_match(&signals.browser_languages),
            ResolutionTier::Default => Some(self.default_language),
        }
    }

    async fn load_stored(&self, store: &dyn PreferenceStore, key: &str) -> Option<Language> {
        match store.load_language(key).await {
            Ok(Some(code)) => match Language::from_tag(&code) {
                Some(language) => Some(language),
                None => {
                    self.errors.classify(
                        ErrorCode::LanguageUnsupported,
                        format!("stored preference '{}' for '{}'", code, key),
                        None,
                    );
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                self.errors
                    .classify_store_error(ResourceKind::Preference, &e, None);
                None
            }
        }
    }

    /// First supported language in `languages`, or the default.
    pub fn best_match(&self, languages: &[String]) -> Language {
        supported_match(languages).unwrap_or(self.default_language)
    }

    /// Persist a language choice for the user (when known) and under the
    /// local key of `signals` (when it has one).
    ///
    /// The local write is attempted even when the user write fails. Returns
    /// the first failure, already classified as `language-save-failed`.
    pub async fn save_preference(
        &self,
        signals: &ResolverSignals,
        language: Language,
    ) -> Result<(), PipelineError> {
        let mut first_error = None;

        if let Some(user_id) = signals.user_id.as_deref() {
            if let Err(e) = self
                .user_store
                .save_language(&user_key(user_id), language.code())
                .await
            {
                first_error = Some(self.errors.classify(
                    ErrorCode::LanguageSaveFailed,
                    format!("user '{}': {}", user_id, e),
                    Some(language),
                ));
            }
        }

        if let Some(key) = signals.local_key() {
            if let Err(e) = self.local_store.save_language(&key, language.code()).await {
                let error = self.errors.classify(
                    ErrorCode::LanguageSaveFailed,
                    format!("local preference '{}': {}", key, e),
                    Some(language),
                );
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn user_key(user_id: &str) -> String {
    format!("user:{}", user_id)
}

/// First tag in `languages` whose primary subtag is a supported language.
pub fn supported_match(languages: &[String]) -> Option<Language> {
    languages
        .iter()
        .map(|tag| normalize_tag(tag))
        .find_map(|code| Language::from_code(&code).ok())
}
