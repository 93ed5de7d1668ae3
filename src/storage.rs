//! Storage interfaces consumed by the pipeline, plus the shipped adapters.
//!
//! Templates are addressed by `(language, filename)`, translations by
//! `(language, domain)`, and language preferences by a string key. The
//! pipeline only ever sees the traits; adapters decide where data lives.

use crate::i18n::Language;
use crate::retry::{with_retry_if, RetryConfig};
use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;
use std::time::Duration;
use tracing::debug;

/// Key of the installation-wide preference, used only by anonymous requests
/// that carry no client id.
pub const LOCAL_PREFERENCE_KEY: &str = "language";

/// Failure reported by a storage adapter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("storage unavailable")]
    Unavailable,
}

impl StoreError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Connection(_) => true,
            StoreError::Server { status, .. } => *status == 429 || *status >= 500,
            StoreError::NotFound(_)
            | StoreError::InvalidFormat(_)
            | StoreError::Io(_)
            | StoreError::Unavailable => false,
        }
    }
}

/// Translation domains; one file per domain and language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TranslationDomain {
    Common,
    Navigation,
    Analysis,
    Settings,
    Errors,
    Results,
    Dashboard,
    Projects,
    Components,
    Hypotheses,
    Business,
}

impl TranslationDomain {
    pub const ALL: [TranslationDomain; 11] = [
        TranslationDomain::Common,
        TranslationDomain::Navigation,
        TranslationDomain::Analysis,
        TranslationDomain::Settings,
        TranslationDomain::Errors,
        TranslationDomain::Results,
        TranslationDomain::Dashboard,
        TranslationDomain::Projects,
        TranslationDomain::Components,
        TranslationDomain::Hypotheses,
        TranslationDomain::Business,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TranslationDomain::Common => "common",
            TranslationDomain::Navigation => "navigation",
            TranslationDomain::Analysis => "analysis",
            TranslationDomain::Settings => "settings",
            TranslationDomain::Errors => "errors",
            TranslationDomain::Results => "results",
            TranslationDomain::Dashboard => "dashboard",
            TranslationDomain::Projects => "projects",
            TranslationDomain::Components => "components",
            TranslationDomain::Hypotheses => "hypotheses",
            TranslationDomain::Business => "business",
        }
    }

    pub fn filename(&self) -> String {
        format!("{}.json", self.as_str())
    }
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Fetch the raw text of a prompt template file.
    async fn fetch_template(&self, language: Language, filename: &str)
        -> Result<String, StoreError>;
}

#[async_trait]
pub trait TranslationStore: Send + Sync {
    /// Fetch a domain's nested key → string mapping.
    async fn fetch_domain(
        &self,
        language: Language,
        domain: TranslationDomain,
    ) -> Result<Value, StoreError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Load the persisted language code for `key`, if any.
    async fn load_language(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Persist a language code for `key`.
    async fn save_language(&self, key: &str, code: &str) -> Result<(), StoreError>;
}

fn template_path(language: Language, filename: &str) -> String {
    format!("prompts/{}/{}", language.code(), filename)
}

fn translation_path(language: Language, domain: TranslationDomain) -> String {
    format!("locales/{}/{}", language.code(), domain.filename())
}

/// Parse a translation file body, requiring a JSON object at the top level.
fn parse_translation_body(path: &str, body: &str) -> Result<Value, StoreError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| StoreError::InvalidFormat(format!("{}: {}", path, e)))?;
    if !value.is_object() {
        return Err(StoreError::InvalidFormat(format!(
            "{}: expected a JSON object",
            path
        )));
    }
    Ok(value)
}

fn map_io_error(path: &Path, error: std::io::Error) -> StoreError {
    if error.kind() == std::io::ErrorKind::NotFound {
        StoreError::NotFound(path.display().to_string())
    } else {
        StoreError::Io(format!("{}: {}", path.display(), error))
    }
}

// ==================== Filesystem Store ====================

/// Reads templates and translations from a directory tree:
/// `{root}/prompts/{lang}/{file}` and `{root}/locales/{lang}/{domain}.json`.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, relative: &str) -> Result<String, StoreError> {
        let path = self.root.join(relative);
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| map_io_error(&path, e))
    }
}

#[async_trait]
impl TemplateStore for FsStore {
    async fn fetch_template(
        &self,
        language: Language,
        filename: &str,
    ) -> Result<String, StoreError> {
        self.read(&template_path(language, filename)).await
    }
}

#[async_trait]
impl TranslationStore for FsStore {
    async fn fetch_domain(
        &self,
        language: Language,
        domain: TranslationDomain,
    ) -> Result<Value, StoreError> {
        let path = translation_path(language, domain);
        let body = self.read(&path).await?;
        parse_translation_body(&path, &body)
    }
}

// ==================== HTTP Store ====================

/// Fetches templates and translations over HTTP from the same relative paths
/// as [`FsStore`], under a base URL.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    template_retry: RetryConfig,
    translation_retry: RetryConfig,
}

impl HttpStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            template_retry: RetryConfig::template_fetch(),
            translation_retry: RetryConfig::translation_fetch(),
        }
    }

    /// Build a store with its own client and a per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::new(client, base_url))
    }

    /// Use `retry` for both template and translation fetches.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.translation_retry = retry.clone();
        self.template_retry = retry;
        self
    }

    async fn get_text(&self, relative: &str, retry: &RetryConfig) -> Result<String, StoreError> {
        let url = format!("{}/{}", self.base_url, relative);

        with_retry_if(
            retry,
            &format!("GET {}", relative),
            || async {
                debug!("Fetching {}", url);
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(map_reqwest_error)?;

                let status = response.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(StoreError::NotFound(relative.to_string()));
                }
                if !status.is_success() {
                    let body = response
                        .text()
                        .await
                        .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
                    return Err(StoreError::Server {
                        status: status.as_u16(),
                        body,
                    });
                }

                response.text().await.map_err(map_reqwest_error)
            },
            StoreError::is_retryable,
        )
        .await
    }
}

fn map_reqwest_error(error: reqwest::Error) -> StoreError {
    if error.is_timeout() {
        StoreError::Timeout(error.to_string())
    } else if error.is_connect() || error.is_request() {
        StoreError::Connection(error.to_string())
    } else {
        StoreError::Io(error.to_string())
    }
}

#[async_trait]
impl TemplateStore for HttpStore {
    async fn fetch_template(
        &self,
        language: Language,
        filename: &str,
    ) -> Result<String, StoreError> {
        self.get_text(&template_path(language, filename), &self.template_retry)
            .await
    }
}

#[async_trait]
impl TranslationStore for HttpStore {
    async fn fetch_domain(
        &self,
        language: Language,
        domain: TranslationDomain,
    ) -> Result<Value, StoreError> {
        let path = translation_path(language, domain);
        let body = self.get_text(&path, &self.translation_retry).await?;
        parse_translation_body(&path, &body)
    }
}

// ==================== In-Memory Store ====================

/// In-process store implementing every storage trait.
///
/// Useful for embedding fixed content and for tests: it can simulate an
/// unreachable backend and add latency to each fetch, and it counts fetches.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    templates: RwLock<HashMap<(Language, String), String>>,
    translations: RwLock<HashMap<(Language, TranslationDomain), Value>>,
    preferences: RwLock<HashMap<String, String>>,
    unreachable: AtomicBool,
    fetches: AtomicUsize,
    latency: Option<Duration>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a fixed delay to every fetch.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert_template(&self, language: Language, filename: &str, content: impl Into<String>) {
        self.templates
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((language, filename.to_string()), content.into());
    }

    pub fn insert_translations(&self, language: Language, domain: TranslationDomain, value: Value) {
        self.translations
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert((language, domain), value);
    }

    /// Make every subsequent operation fail with [`StoreError::Unavailable`].
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Number of template/translation fetches served or attempted.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    async fn begin_fetch(&self) -> Result<(), StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

#[async_trait]
impl TemplateStore for InMemoryStore {
    async fn fetch_template(
        &self,
        language: Language,
        filename: &str,
    ) -> Result<String, StoreError> {
        self.begin_fetch().await?;
        self.templates
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(language, filename.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(template_path(language, filename)))
    }
}

#[async_trait]
impl TranslationStore for InMemoryStore {
    async fn fetch_domain(
        &self,
        language: Language,
        domain: TranslationDomain,
    ) -> Result<Value, StoreError> {
        self.begin_fetch().await?;
        self.translations
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(language, domain))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(translation_path(language, domain)))
    }
}

#[async_trait]
impl PreferenceStore for InMemoryStore {
    async fn load_language(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(self
            .preferences
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned())
    }

    async fn save_language(&self, key: &str, code: &str) -> Result<(), StoreError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.preferences
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), code.to_string());
        Ok(())
    }
}

// ==================== JSON File Preference Store ====================

/// Persists language preferences as a JSON object `{ key: code }` in one file.
#[derive(Debug, Clone)]
pub struct JsonFilePreferenceStore {
    path: PathBuf,
}

impl JsonFilePreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(body) if body.trim().is_empty() => Ok(BTreeMap::new()),
            Ok(body) => serde_json::from_str(&body).map_err(|e| {
                StoreError::InvalidFormat(format!("{}: {}", self.path.display(), e))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(map_io_error(&self.path, e)),
        }
    }
}

#[async_trait]
impl PreferenceStore for JsonFilePreferenceStore {
    async fn load_language(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all().await?.remove(key))
    }

    async fn save_language(&self, key: &str, code: &str) -> Result<(), StoreError> {
        let mut all = self.read_all().await?;
        all.insert(key.to_string(), code.to_string());

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| map_io_error(parent, e))?;
            }
        }

        let body = serde_json::to_string_pretty(&all)
            .map_err(|e| StoreError::InvalidFormat(e.to_string()))?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| map_io_error(&self.path, e))
    }
}
