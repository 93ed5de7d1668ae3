//! Error taxonomy and the single classification point for pipeline failures.
//!
//! Every fallible step in the pipeline reports through
//! [`ErrorClassifier::classify`], which records the error in a bounded
//! recent-error log, logs it, and hands back a typed [`PipelineError`] with a
//! default English message and, when available, a localized one. Callers use
//! the returned value for diagnostics only; lookups always continue with a
//! fallback.

use crate::i18n::Language;
use crate::storage::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::sync::Mutex;
use tracing::warn;

/// Default capacity of the recent-error log.
pub const DEFAULT_ERROR_LOG_CAPACITY: usize = 50;

/// Closed set of error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    TranslationKeyNotFound,
    TranslationFileNotFound,
    TranslationLoadingFailed,
    TemplateNotFound,
    TemplateLoadingFailed,
    TemplateInvalidFormat,
    LanguageUnsupported,
    LanguageSwitchFailed,
    LanguageDetectionFailed,
    LanguageSaveFailed,
    NetworkConnectionFailed,
    NetworkTimeout,
    NetworkServerError,
    GeneralUnknown,
}

/// Coarse grouping of error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Translation,
    Template,
    Language,
    Network,
    General,
}

/// The kind of external resource an I/O failure happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Template,
    Translation,
    Preference,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TranslationKeyNotFound => "translation-key-not-found",
            ErrorCode::TranslationFileNotFound => "translation-file-not-found",
            ErrorCode::TranslationLoadingFailed => "translation-loading-failed",
            ErrorCode::TemplateNotFound => "template-not-found",
            ErrorCode::TemplateLoadingFailed => "template-loading-failed",
            ErrorCode::TemplateInvalidFormat => "template-invalid-format",
            ErrorCode::LanguageUnsupported => "language-unsupported",
            ErrorCode::LanguageSwitchFailed => "language-switch-failed",
            ErrorCode::LanguageDetectionFailed => "language-detection-failed",
            ErrorCode::LanguageSaveFailed => "language-save-failed",
            ErrorCode::NetworkConnectionFailed => "network-connection-failed",
            ErrorCode::NetworkTimeout => "network-timeout",
            ErrorCode::NetworkServerError => "network-server-error",
            ErrorCode::GeneralUnknown => "general-unknown",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorCode::TranslationKeyNotFound
            | ErrorCode::TranslationFileNotFound
            | ErrorCode::TranslationLoadingFailed => ErrorCategory::Translation,
            ErrorCode::TemplateNotFound
            | ErrorCode::TemplateLoadingFailed
            | ErrorCode::TemplateInvalidFormat => ErrorCategory::Template,
            ErrorCode::LanguageUnsupported
            | ErrorCode::LanguageSwitchFailed
            | ErrorCode::LanguageDetectionFailed
            | ErrorCode::LanguageSaveFailed => ErrorCategory::Language,
            ErrorCode::NetworkConnectionFailed
            | ErrorCode::NetworkTimeout
            | ErrorCode::NetworkServerError => ErrorCategory::Network,
            ErrorCode::GeneralUnknown => ErrorCategory::General,
        }
    }

    /// Default (English) user-facing message.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::TranslationKeyNotFound => "Translation key not found",
            ErrorCode::TranslationFileNotFound => "Translation file not found",
            ErrorCode::TranslationLoadingFailed => "Failed to load translations",
            ErrorCode::TemplateNotFound => "Prompt template not found",
            ErrorCode::TemplateLoadingFailed => "Failed to load prompt template",
            ErrorCode::TemplateInvalidFormat => "Prompt template has an invalid format",
            ErrorCode::LanguageUnsupported => "Language is not supported",
            ErrorCode::LanguageSwitchFailed => "Failed to switch language",
            ErrorCode::LanguageDetectionFailed => "Failed to detect language",
            ErrorCode::LanguageSaveFailed => "Failed to save language preference",
            ErrorCode::NetworkConnectionFailed => "Network connection failed",
            ErrorCode::NetworkTimeout => "Network request timed out",
            ErrorCode::NetworkServerError => "Server error",
            ErrorCode::GeneralUnknown => "Unknown error",
        }
    }

    /// Localized message, if one exists for `language`.
    ///
    /// English has no separate variant: the default message is English.
    pub fn localized_message(&self, language: Language) -> Option<&'static str> {
        if language != Language::RUSSIAN {
            return None;
        }
        Some(match self {
            ErrorCode::TranslationKeyNotFound => "Ключ перевода не найден",
            ErrorCode::TranslationFileNotFound => "Файл перевода не найден",
            ErrorCode::TranslationLoadingFailed => "Не удалось загрузить переводы",
            ErrorCode::TemplateNotFound => "Шаблон промпта не найден",
            ErrorCode::TemplateLoadingFailed => "Не удалось загрузить шаблон промпта",
            ErrorCode::TemplateInvalidFormat => "Шаблон промпта имеет неверный формат",
            ErrorCode::LanguageUnsupported => "Язык не поддерживается",
            ErrorCode::LanguageSwitchFailed => "Не удалось переключить язык",
            ErrorCode::LanguageDetectionFailed => "Не удалось определить язык",
            ErrorCode::LanguageSaveFailed => "Не удалось сохранить выбранный язык",
            ErrorCode::NetworkConnectionFailed => "Ошибка сетевого подключения",
            ErrorCode::NetworkTimeout => "Превышено время ожидания запроса",
            ErrorCode::NetworkServerError => "Ошибка сервера",
            ErrorCode::GeneralUnknown => "Неизвестная ошибка",
        })
    }

    /// Map a storage failure on `resource` to an error code.
    pub fn from_store_error(resource: ResourceKind, error: &StoreError) -> ErrorCode {
        match (error, resource) {
            (StoreError::NotFound(_), ResourceKind::Template) => ErrorCode::TemplateNotFound,
            (StoreError::NotFound(_), ResourceKind::Translation) => {
                ErrorCode::TranslationFileNotFound
            }
            (StoreError::NotFound(_), ResourceKind::Preference) => ErrorCode::GeneralUnknown,
            (StoreError::Timeout(_), _) => ErrorCode::NetworkTimeout,
            (StoreError::Connection(_), _) | (StoreError::Unavailable, _) => {
                ErrorCode::NetworkConnectionFailed
            }
            (StoreError::Server { .. }, _) => ErrorCode::NetworkServerError,
            (StoreError::InvalidFormat(_), ResourceKind::Template) => {
                ErrorCode::TemplateInvalidFormat
            }
            (StoreError::InvalidFormat(_), ResourceKind::Translation)
            | (StoreError::Io(_), ResourceKind::Translation) => ErrorCode::TranslationLoadingFailed,
            (StoreError::Io(_), ResourceKind::Template) => ErrorCode::TemplateLoadingFailed,
            (StoreError::InvalidFormat(_), ResourceKind::Preference)
            | (StoreError::Io(_), ResourceKind::Preference) => ErrorCode::LanguageSwitchFailed,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified pipeline error.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("[{code}] {message}")]
pub struct PipelineError {
    pub code: ErrorCode,

    /// Default message, with the failure detail appended when present
    pub message: String,

    /// Message in the user's language, when a localized variant exists
    pub localized_message: Option<String>,

    pub detail: Option<String>,

    pub language: Option<Language>,

    pub occurred_at: DateTime<Utc>,
}

impl PipelineError {
    pub fn new(code: ErrorCode, detail: Option<String>, language: Option<Language>) -> Self {
        let detail = detail.filter(|d| !d.trim().is_empty());
        let message = match &detail {
            Some(detail) => format!("{}: {}", code.default_message(), detail),
            None => code.default_message().to_string(),
        };
        let localized_message = language
            .and_then(|lang| code.localized_message(lang))
            .map(str::to_string);

        Self {
            code,
            message,
            localized_message,
            detail,
            language,
            occurred_at: Utc::now(),
        }
    }

    /// The message to show a user: localized when available, default otherwise.
    pub fn user_message(&self) -> &str {
        self.localized_message.as_deref().unwrap_or(&self.message)
    }
}

/// Records classified errors in a bounded ring buffer.
///
/// Instances are injected (usually behind an `Arc`) so separate pipelines and
/// tests keep separate logs.
pub struct ErrorClassifier {
    capacity: usize,
    recent: Mutex<VecDeque<PipelineError>>,
}

impl ErrorClassifier {
    /// Create a classifier keeping at most `capacity` recent errors (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            recent: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Classify a failure: build the typed error, log it, and record it.
    pub fn classify(
        &self,
        code: ErrorCode,
        detail: impl Into<String>,
        language: Option<Language>,
    ) -> PipelineError {
        let error = PipelineError::new(code, Some(detail.into()), language);

        warn!(
            code = %error.code,
            language = ?error.language.map(|l| l.code()),
            "{}",
            error.message
        );

        let mut recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        if recent.len() == self.capacity {
            recent.pop_front();
        }
        recent.push_back(error.clone());

        error
    }

    /// Classify a storage failure on the given resource kind.
    pub fn classify_store_error(
        &self,
        resource: ResourceKind,
        error: &StoreError,
        language: Option<Language>,
    ) -> PipelineError {
        self.classify(
            ErrorCode::from_store_error(resource, error),
            error.to_string(),
            language,
        )
    }

    /// Snapshot of recorded errors, oldest first.
    pub fn recent(&self) -> Vec<PipelineError> {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Most recent error, if any.
    pub fn last(&self) -> Option<PipelineError> {
        self.recent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .back()
            .cloned()
    }

    /// Number of recorded errors per code.
    pub fn counts(&self) -> BTreeMap<ErrorCode, usize> {
        let recent = self.recent.lock().unwrap_or_else(|e| e.into_inner());
        let mut counts = BTreeMap::new();
        for error in recent.iter() {
            *counts.entry(error.code).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.recent.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&self) {
        self.recent.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_ERROR_LOG_CAPACITY)
    }
}
