//! Pipeline metrics and observability.
//!
//! Counters for template loading, fallbacks, validation and response review.
//! A `PipelineMetrics` is created by whoever wires the pipeline and shared
//! through an `Arc`; there is no global instance.

use crate::prompts::TemplateSource;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Debug, Default)]
pub struct PipelineMetrics {
    /// Template served from a fresh cached batch
    template_cache_hits: AtomicUsize,

    /// Template request that had to load (or reload) its language batch
    template_cache_misses: AtomicUsize,

    /// Template files fetched from storage
    template_loads: AtomicUsize,

    /// Template fetches that failed
    template_load_failures: AtomicUsize,

    /// Templates served per fallback tier
    served_requested: AtomicUsize,
    served_fallback_language: AtomicUsize,
    served_stable: AtomicUsize,
    served_builtin: AtomicUsize,

    /// Prompt validations run
    validations: AtomicUsize,

    /// Responses reviewed, by outcome
    responses_passed: AtomicUsize,
    responses_failed: AtomicUsize,

    /// Corrections applied to templates
    corrections_applied: AtomicUsize,

    /// Translation keys that fell back to another language or the key itself
    translation_misses: AtomicUsize,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self) {
        self.template_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.template_cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_template_load(&self, succeeded: bool) {
        self.template_loads.fetch_add(1, Ordering::Relaxed);
        if !succeeded {
            self.template_load_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record which fallback tier served a template.
    pub fn record_served(&self, source: TemplateSource) {
        let counter = match source {
            TemplateSource::Requested => &self.served_requested,
            TemplateSource::FallbackLanguage => &self.served_fallback_language,
            TemplateSource::Stable => &self.served_stable,
            TemplateSource::BuiltIn => &self.served_builtin,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_validation(&self) {
        self.validations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response(&self, passed: bool) {
        let counter = if passed {
            &self.responses_passed
        } else {
            &self.responses_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_corrections(&self, applied: usize) {
        self.corrections_applied.fetch_add(applied, Ordering::Relaxed);
    }

    pub fn record_translation_miss(&self) {
        self.translation_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hits(&self) -> usize {
        self.template_cache_hits.load(Ordering::Relaxed)
    }

    pub fn cache_misses(&self) -> usize {
        self.template_cache_misses.load(Ordering::Relaxed)
    }

    pub fn template_loads(&self) -> usize {
        self.template_loads.load(Ordering::Relaxed)
    }

    pub fn served(&self, source: TemplateSource) -> usize {
        match source {
            TemplateSource::Requested => &self.served_requested,
            TemplateSource::FallbackLanguage => &self.served_fallback_language,
            TemplateSource::Stable => &self.served_stable,
            TemplateSource::BuiltIn => &self.served_builtin,
        }
        .load(Ordering::Relaxed)
    }

    /// Generate a metrics report.
    pub fn report(&self) -> MetricsReport {
        let hits = self.cache_hits();
        let misses = self.cache_misses();
        let lookups = hits + misses;
        let cache_hit_rate = if lookups > 0 {
            (hits as f64 / lookups as f64) * 100.0
        } else {
            0.0
        };

        let passed = self.responses_passed.load(Ordering::Relaxed);
        let failed = self.responses_failed.load(Ordering::Relaxed);
        let reviewed = passed + failed;
        let response_pass_rate = if reviewed > 0 {
            (passed as f64 / reviewed as f64) * 100.0
        } else {
            0.0
        };

        MetricsReport {
            cache_hits: hits,
            cache_misses: misses,
            cache_hit_rate,
            template_loads: self.template_loads(),
            template_load_failures: self.template_load_failures.load(Ordering::Relaxed),
            served_requested: self.served(TemplateSource::Requested),
            served_fallback_language: self.served(TemplateSource::FallbackLanguage),
            served_stable: self.served(TemplateSource::Stable),
            served_builtin: self.served(TemplateSource::BuiltIn),
            validations: self.validations.load(Ordering::Relaxed),
            responses_passed: passed,
            responses_failed: failed,
            response_pass_rate,
            corrections_applied: self.corrections_applied.load(Ordering::Relaxed),
            translation_misses: self.translation_misses.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of pipeline counters.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub cache_hits: usize,
    pub cache_misses: usize,

    /// Cache hit rate as a percentage (0-100)
    pub cache_hit_rate: f64,

    pub template_loads: usize,
    pub template_load_failures: usize,

    pub served_requested: usize,
    pub served_fallback_language: usize,
    pub served_stable: usize,
    pub served_builtin: usize,

    pub validations: usize,

    pub responses_passed: usize,
    pub responses_failed: usize,

    /// Response pass rate as a percentage (0-100)
    pub response_pass_rate: f64,

    pub corrections_applied: usize,
    pub translation_misses: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==================== Counter Tests ====================

    #[test]
    fn test_record_cache_hits_and_misses() {
        let metrics = PipelineMetrics::new();

        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        assert_eq!(metrics.cache_hits(), 2);
        assert_eq!(metrics.cache_misses(), 1);
    }

    #[test]
    fn test_record_served_per_tier() {
        let metrics = PipelineMetrics::new();

        metrics.record_served(TemplateSource::Stable);
        metrics.record_served(TemplateSource::Stable);
        metrics.record_served(TemplateSource::BuiltIn);

        assert_eq!(metrics.served(TemplateSource::Stable), 2);
        assert_eq!(metrics.served(TemplateSource::BuiltIn), 1);
        assert_eq!(metrics.served(TemplateSource::Requested), 0);
    }

    #[test]
    fn test_instances_are_independent() {
        let first = PipelineMetrics::new();
        let second = PipelineMetrics::new();

        first.record_validation();

        assert_eq!(first.report().validations, 1);
        assert_eq!(second.report().validations, 0);
    }

    // ==================== Report Tests ====================

    #[test]
    fn test_report_empty() {
        let report = PipelineMetrics::new().report();

        assert_eq!(report.cache_hit_rate, 0.0);
        assert_eq!(report.response_pass_rate, 0.0);
        assert_eq!(report.template_loads, 0);
    }

    #[test]
    fn test_report_rates() {
        let metrics = PipelineMetrics::new();

        // 3 hits, 1 miss = 75% hit rate
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();

        // 1 of 4 responses failed = 75% pass rate
        metrics.record_response(true);
        metrics.record_response(true);
        metrics.record_response(true);
        metrics.record_response(false);

        let report = metrics.report();
        assert_eq!(report.cache_hit_rate, 75.0);
        assert_eq!(report.response_pass_rate, 75.0);
    }

    #[test]
    fn test_template_load_failures() {
        let metrics = PipelineMetrics::new();

        metrics.record_template_load(true);
        metrics.record_template_load(false);

        let report = metrics.report();
        assert_eq!(report.template_loads, 2);
        assert_eq!(report.template_load_failures, 1);
    }

    #[test]
    fn test_report_serializes() {
        let metrics = PipelineMetrics::new();
        metrics.record_corrections(3);

        let json = serde_json::to_value(metrics.report()).expect("Should serialize");
        assert_eq!(json["corrections_applied"], 3);
    }
}
