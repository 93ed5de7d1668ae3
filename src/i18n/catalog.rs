//! UI translation lookup with language fallback.
//!
//! Keys are dotted paths whose first segment names the domain file, e.g.
//! `errors.template.notFound` looks up `template.notFound` in `errors.json`.
//! A missing key falls back to the fallback language and finally to the key
//! itself, so lookups never fail.

use crate::error::{ErrorClassifier, ErrorCode, ResourceKind};
use crate::i18n::language::Language;
use crate::metrics::PipelineMetrics;
use crate::storage::{StoreError, TranslationDomain, TranslationStore};
use futures::future::join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OnceCell;
use tracing::debug;

/// `None` records a domain file that does not exist.
type DomainCell = Arc<OnceCell<Option<Arc<Value>>>>;

pub struct TranslationCatalog {
    store: Arc<dyn TranslationStore>,
    errors: Arc<ErrorClassifier>,
    metrics: Arc<PipelineMetrics>,
    fallback_language: Language,
    domains: Mutex<HashMap<(Language, TranslationDomain), DomainCell>>,
}

impl TranslationCatalog {
    pub fn new(
        store: Arc<dyn TranslationStore>,
        errors: Arc<ErrorClassifier>,
        metrics: Arc<PipelineMetrics>,
        fallback_language: Language,
    ) -> Self {
        Self {
            store,
            errors,
            metrics,
            fallback_language,
            domains: Mutex::new(HashMap::new()),
        }
    }

    /// Translate `key` into `language`, replacing `{name}` placeholders.
    pub async fn translate(&self, language: Language, key: &str, params: &[(&str, &str)]) -> String {
        let Some((domain, path)) = split_key(key) else {
            self.errors.classify(
                ErrorCode::TranslationKeyNotFound,
                format!("'{}' does not name a translation domain", key),
                Some(language),
            );
            self.metrics.record_translation_miss();
            return key.to_string();
        };

        if let Some(text) = self.lookup(language, domain, path).await {
            return interpolate(&text, params);
        }

        self.metrics.record_translation_miss();
        if language != self.fallback_language {
            if let Some(text) = self.lookup(self.fallback_language, domain, path).await {
                debug!(
                    "Translation '{}' missing for {}, using {}",
                    key, language, self.fallback_language
                );
                return interpolate(&text, params);
            }
        }

        self.errors.classify(
            ErrorCode::TranslationKeyNotFound,
            key.to_string(),
            Some(language),
        );
        key.to_string()
    }

    /// Load every domain of `language` concurrently. Returns how many loaded.
    pub async fn preload(&self, language: Language) -> usize {
        let loads = TranslationDomain::ALL
            .iter()
            .map(|domain| self.domain(language, *domain));
        join_all(loads)
            .await
            .into_iter()
            .filter(Option::is_some)
            .count()
    }

    /// Forget every loaded domain.
    pub fn clear(&self) {
        self.domains
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    async fn lookup(&self, language: Language, domain: TranslationDomain, path: &str) -> Option<String> {
        let value = self.domain(language, domain).await?;
        resolve_path(&value, path)
    }

    /// The loaded domain document. Concurrent callers share one fetch. A
    /// missing file is remembered; any other failed fetch is not cached and
    /// is retried by the next caller.
    async fn domain(&self, language: Language, domain: TranslationDomain) -> Option<Arc<Value>> {
        let cell = {
            let mut domains = self.domains.lock().unwrap_or_else(|e| e.into_inner());
            domains
                .entry((language, domain))
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        let loaded = cell
            .get_or_try_init(|| async {
                match self.store.fetch_domain(language, domain).await {
                    Ok(value) => Ok(Some(Arc::new(value))),
                    Err(e @ StoreError::NotFound(_)) => {
                        self.classify_load_error(language, domain, &e);
                        Ok(None)
                    }
                    Err(e) => Err(e),
                }
            })
            .await;

        match loaded {
            Ok(value) => value.clone(),
            Err(e) => {
                self.classify_load_error(language, domain, &e);
                None
            }
        }
    }

    fn classify_load_error(&self, language: Language, domain: TranslationDomain, error: &StoreError) {
        self.errors.classify(
            ErrorCode::from_store_error(ResourceKind::Translation, error),
            format!("{}/{}: {}", language, domain.filename(), error),
            Some(language),
        );
    }
}

fn split_key(key: &str) -> Option<(TranslationDomain, &str)> {
    let (domain, path) = key.split_once('.')?;
    let domain = TranslationDomain::ALL
        .into_iter()
        .find(|d| d.as_str() == domain)?;
    (!path.is_empty()).then_some((domain, path))
}

/// Walk a dotted path through nested objects to a string leaf.
fn resolve_path(value: &Value, path: &str) -> Option<String> {
    path.split('.')
        .try_fold(value, |node, segment| node.get(segment))?
        .as_str()
        .map(str::to_string)
}

/// Replace each `{name}` with its value; unknown placeholders stay as-is.
pub fn interpolate(template: &str, params: &[(&str, &str)]) -> String {
    params
        .iter()
        .fold(template.to_string(), |text, (name, value)| {
            text.replace(&format!("{{{}}}", name), value)
        })
}
