//! Language-consistent prompt preparation and response review for
//! LLM-driven UX analysis.
//!
//! A request is resolved to a [`LanguageContext`], a validated prompt
//! template is served for it (never failing, thanks to stable and built-in
//! fallbacks), and the generated response is scored, parsed and, when it
//! falls short, used to correct the template for the next attempt.

pub mod config;
pub mod error;
pub mod i18n;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod parser;
pub mod prompts;
pub mod quality;
pub mod retry;
pub mod storage;

pub use config::Config;
pub use error::{ErrorClassifier, ErrorCode, PipelineError};
pub use i18n::{Language, LanguageContext};
pub use orchestrator::{ConsistencyOrchestrator, RequestHeaders, ResponseValidation};
pub use prompts::PromptType;
pub use quality::ResponseIssue;
