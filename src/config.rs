use crate::error::DEFAULT_ERROR_LOG_CAPACITY;
use crate::i18n::Language;
use crate::prompts::repository::{DEFAULT_CONTEXT_CAP, DEFAULT_TEMPLATE_TTL_HOURS};
use crate::prompts::RepositoryConfig;
use crate::quality::QualityThresholds;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Longest accepted template cache lifetime (one year).
pub const MAX_TEMPLATE_TTL_HOURS: i64 = 24 * 365;

#[derive(Debug, Clone)]
pub struct Config {
    // Languages
    pub default_language: Language,
    pub fallback_language: Language,

    // Template storage (HTTP wins when both are set)
    pub template_base_url: Option<String>,
    pub template_dir: Option<PathBuf>,
    pub preference_file: Option<PathBuf>,

    // Template cache
    pub template_ttl_hours: i64,
    pub context_cap: usize,

    // Error log
    pub error_log_capacity: usize,

    // Response review
    pub auto_correct: bool,
    pub min_quality_score: f64,

    // HTTP
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_language: Language::default_language(),
            fallback_language: Language::default_language(),
            template_base_url: None,
            template_dir: None,
            preference_file: None,
            template_ttl_hours: DEFAULT_TEMPLATE_TTL_HOURS,
            context_cap: DEFAULT_CONTEXT_CAP,
            error_log_capacity: DEFAULT_ERROR_LOG_CAPACITY,
            auto_correct: true,
            min_quality_score: QualityThresholds::default().min_quality_score,
            http_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Read `.env` (if present), then the environment.
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_env()
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        Ok(Self {
            // Languages
            default_language: language_var("PROMPT_DEFAULT_LANGUAGE", defaults.default_language)?,
            fallback_language: language_var("PROMPT_FALLBACK_LANGUAGE", defaults.fallback_language)?,

            // Template storage
            template_base_url: optional_var("PROMPT_TEMPLATE_BASE_URL"),
            template_dir: optional_var("PROMPT_TEMPLATE_DIR").map(PathBuf::from),
            preference_file: optional_var("PROMPT_PREFERENCE_FILE").map(PathBuf::from),

            // Template cache
            template_ttl_hours: ttl_hours_var("PROMPT_TEMPLATE_TTL_HOURS", defaults.template_ttl_hours)?,
            context_cap: parse_var("PROMPT_CONTEXT_CAP", defaults.context_cap)?,

            // Error log
            error_log_capacity: parse_var("PROMPT_ERROR_LOG_CAPACITY", defaults.error_log_capacity)?,

            // Response review
            auto_correct: parse_var("PROMPT_AUTO_CORRECT", defaults.auto_correct)?,
            min_quality_score: parse_var("PROMPT_MIN_QUALITY_SCORE", defaults.min_quality_score)?,

            // HTTP
            http_timeout_secs: parse_var("PROMPT_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
        })
    }

    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            fallback_language: self.fallback_language,
            ttl: chrono::Duration::hours(self.template_ttl_hours.clamp(1, MAX_TEMPLATE_TTL_HOURS)),
            context_cap: self.context_cap,
        }
    }

    pub fn quality_thresholds(&self) -> QualityThresholds {
        QualityThresholds {
            min_quality_score: self.min_quality_score,
            ..QualityThresholds::default()
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Set and non-blank value of `name`.
fn optional_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parsed value of `name`, `default` when unset. A set but unparsable value
/// is an error rather than silently ignored.
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_var(name) {
        Some(value) => value
            .parse()
            .with_context(|| format!("{} has invalid value '{}'", name, value)),
        None => Ok(default),
    }
}

fn ttl_hours_var(name: &str, default: i64) -> Result<i64> {
    let hours = parse_var(name, default)?;
    if !(1..=MAX_TEMPLATE_TTL_HOURS).contains(&hours) {
        bail!(
            "{} must be between 1 and {} hours, got {}",
            name,
            MAX_TEMPLATE_TTL_HOURS,
            hours
        );
    }
    Ok(hours)
}

fn language_var(name: &str, default: Language) -> Result<Language> {
    match optional_var(name) {
        Some(value) => Language::from_code(&value.to_lowercase())
            .with_context(|| format!("{} is not a supported language", name)),
        None => Ok(default),
    }
}
