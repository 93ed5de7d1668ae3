//! Prompt templates: kinds, curated references, validation, loading and
//! correction.

pub mod builtin;
pub mod corrector;
pub mod kind;
pub mod repository;
pub mod stable;
pub mod validator;

pub use corrector::{
    AutoCorrector, CorrectionCategory, CorrectionImpact, CorrectionRecord, CorrectionResult,
};
pub use kind::{PromptType, STRUCTURED_OUTPUT_FIELDS};
pub use repository::{
    CacheStats, PromptTemplate, RepositoryConfig, TemplateMetadata, TemplateRepository,
    TemplateSource,
};
pub use stable::{SimilarityReport, StableTemplate, StableTemplateRegistry};
pub use validator::{IssueCode, IssueKind, PromptValidator, ValidationIssue, ValidationResult};
