//! Minimal built-in templates, the last tier of template fallback.

use crate::i18n::Language;
use crate::prompts::kind::{PromptType, STRUCTURED_OUTPUT_FIELDS};

/// Build the minimal built-in template for `kind` in `language`.
///
/// Always non-empty. Languages without dedicated wording get the English text.
pub fn builtin_template(kind: PromptType, language: Language) -> String {
    let russian = language == Language::RUSSIAN;
    let body = match (kind, russian) {
        (PromptType::Main, true) => {
            "Проанализируй интерфейс с точки зрения UX. Опиши экран, аудиторию и поведение пользователей, перечисли проблемы и дай рекомендации по улучшению."
        }
        (PromptType::Main, false) => {
            "Analyze the interface from a UX perspective. Describe the screen, audience and user behavior, list the problems and give recommendations for improvement."
        }
        (PromptType::Json, true) | (PromptType::JsonStructured, true) => {
            "Проведи UX-анализ интерфейса и верни структурированный результат в формате JSON с полями:"
        }
        (PromptType::Json, false) | (PromptType::JsonStructured, false) => {
            "Perform a UX analysis of the interface and return a structured result as JSON with the fields:"
        }
        (PromptType::AbTest, true) => {
            "Проанализируй интерфейс и предложи A/B тесты. Для каждого теста укажи гипотезу, варианты и целевые метрики."
        }
        (PromptType::AbTest, false) => {
            "Analyze the interface and propose A/B tests. For each test give the hypothesis, the variants and the target metrics."
        }
        (PromptType::BusinessAnalytics, true) => {
            "Проанализируй влияние интерфейса на бизнес: ключевые метрики, потери конверсии и рекомендации по росту."
        }
        (PromptType::BusinessAnalytics, false) => {
            "Analyze the business impact of the interface: key metrics, conversion losses and recommendations for growth."
        }
        (PromptType::Hypotheses, true) => {
            "Проанализируй интерфейс и сформулируй продуктовые гипотезы. Для каждой гипотезы укажи приоритет и способ проверки."
        }
        (PromptType::Hypotheses, false) => {
            "Analyze the interface and formulate product hypotheses. For each hypothesis give a priority and a validation method."
        }
    };

    if !kind.expects_structured_output() {
        return body.to_string();
    }

    let clause = if russian {
        "Не оборачивай ответ в markdown, верни только JSON."
    } else {
        "Do not wrap the response in markdown; return only JSON."
    };
    format!("{}\n{}\n{}", body, STRUCTURED_OUTPUT_FIELDS.join(", "), clause)
}
