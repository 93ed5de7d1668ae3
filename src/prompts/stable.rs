//! Curated, versioned reference templates.
//!
//! Each entry is both the quality baseline that loaded templates are compared
//! against and the last real template the repository falls back to.

use crate::i18n::Language;
use crate::prompts::kind::PromptType;
use serde::Serialize;

/// Number of key phrases sampled from a reference template.
const KEY_PHRASE_COUNT: usize = 5;
const KEY_PHRASE_MIN_CHARS: usize = 10;
const KEY_PHRASE_MAX_CHARS: usize = 100;

/// Minimum similarity for a template to count as close to its reference.
pub const SIMILARITY_THRESHOLD: f64 = 0.7;

/// Length delta above which a length-deviation issue is reported.
const LENGTH_DEVIATION_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StableQuality {
    pub tested: bool,
    pub quality_score: u32,
    pub language: Language,
}

/// A curated reference template.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StableTemplate {
    pub kind: PromptType,
    pub language: Language,
    pub content: String,
    pub version: String,
    /// Where the entry came from (e.g. "curated")
    pub source: String,
    pub quality: StableQuality,
}

impl StableTemplate {
    pub fn new(kind: PromptType, language: Language, content: impl Into<String>, version: &str) -> Self {
        Self {
            kind,
            language,
            content: content.into(),
            version: version.to_string(),
            source: "curated".to_string(),
            quality: StableQuality {
                tested: true,
                quality_score: 95,
                language,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SimilarityIssue {
    MissingKeyPhrase { phrase: String },
    LengthDeviation { delta: f64 },
}

/// Result of comparing a template against its reference.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarityReport {
    /// Similarity ratio, clamped to 0.0-1.0
    pub similarity: f64,

    /// Similarity as a 0-100 score
    pub score: f64,

    /// Relative length difference between template and reference
    pub length_delta: f64,

    pub issues: Vec<SimilarityIssue>,

    pub is_valid: bool,
}

impl SimilarityReport {
    pub fn missing_phrase_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|issue| matches!(issue, SimilarityIssue::MissingKeyPhrase { .. }))
            .count()
    }
}

/// Registry of reference templates keyed by (kind, language).
#[derive(Debug, Clone)]
pub struct StableTemplateRegistry {
    entries: Vec<StableTemplate>,
}

impl StableTemplateRegistry {
    /// Registry with the curated entries for every kind and supported language.
    pub fn new() -> Self {
        Self {
            entries: curated_entries(),
        }
    }

    /// Registry without entries; lookups fall through to built-in templates.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn with_entries(entries: Vec<StableTemplate>) -> Self {
        Self { entries }
    }

    pub fn get(&self, kind: PromptType, language: Language) -> Option<&StableTemplate> {
        self.entries
            .iter()
            .find(|entry| entry.kind == kind && entry.language == language)
    }

    /// Whether `content` is exactly the reference content for (kind, language).
    pub fn is_stable_content(&self, kind: PromptType, language: Language, content: &str) -> bool {
        self.get(kind, language)
            .map(|entry| entry.content == content)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Compare `content` with the reference for (kind, language).
    ///
    /// `similarity = 1 - length_delta - 0.1 * missing_key_phrases`, where the
    /// key phrases are the first five sentence-like segments of the reference.
    /// Returns `None` when no reference exists.
    pub fn similarity_to(
        &self,
        content: &str,
        kind: PromptType,
        language: Language,
    ) -> Option<SimilarityReport> {
        let reference = self.get(kind, language)?;

        let reference_len = reference.content.chars().count();
        let content_len = content.chars().count();
        let longest = reference_len.max(content_len);
        let length_delta = if longest == 0 {
            0.0
        } else {
            reference_len.abs_diff(content_len) as f64 / longest as f64
        };

        let mut issues: Vec<SimilarityIssue> = key_phrases(&reference.content)
            .into_iter()
            .filter(|phrase| !content.contains(phrase.as_str()))
            .map(|phrase| SimilarityIssue::MissingKeyPhrase { phrase })
            .collect();
        let missing = issues.len();

        if length_delta > LENGTH_DEVIATION_THRESHOLD {
            issues.push(SimilarityIssue::LengthDeviation {
                delta: length_delta,
            });
        }

        let similarity = (1.0 - length_delta - 0.1 * missing as f64).clamp(0.0, 1.0);

        Some(SimilarityReport {
            similarity,
            score: similarity * 100.0,
            length_delta,
            is_valid: similarity > SIMILARITY_THRESHOLD && issues.is_empty(),
            issues,
        })
    }
}

impl Default for StableTemplateRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// First five sentence-like segments of 10-100 characters.
pub fn key_phrases(reference: &str) -> Vec<String> {
    reference
        .split(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|segment| {
            let len = segment.chars().count();
            (KEY_PHRASE_MIN_CHARS..=KEY_PHRASE_MAX_CHARS).contains(&len)
        })
        .take(KEY_PHRASE_COUNT)
        .map(str::to_string)
        .collect()
}

fn curated_entries() -> Vec<StableTemplate> {
    use PromptType::*;
    let ru = Language::RUSSIAN;
    let en = Language::ENGLISH;

    vec![
        StableTemplate::new(Main, ru, RU_MAIN, "2.1.0"),
        StableTemplate::new(Json, ru, RU_JSON, "2.3.0"),
        StableTemplate::new(JsonStructured, ru, RU_JSON_STRUCTURED, "1.2.0"),
        StableTemplate::new(AbTest, ru, RU_AB_TEST, "1.1.0"),
        StableTemplate::new(BusinessAnalytics, ru, RU_BUSINESS_ANALYTICS, "1.0.2"),
        StableTemplate::new(Hypotheses, ru, RU_HYPOTHESES, "1.0.1"),
        StableTemplate::new(Main, en, EN_MAIN, "2.1.0"),
        StableTemplate::new(Json, en, EN_JSON, "2.3.0"),
        StableTemplate::new(JsonStructured, en, EN_JSON_STRUCTURED, "1.2.0"),
        StableTemplate::new(AbTest, en, EN_AB_TEST, "1.1.0"),
        StableTemplate::new(BusinessAnalytics, en, EN_BUSINESS_ANALYTICS, "1.0.2"),
        StableTemplate::new(Hypotheses, en, EN_HYPOTHESES, "1.0.1"),
    ]
}

// ==================== Russian References ====================

const RU_MAIN: &str = "Ты опытный UX-исследователь. Проанализируй предоставленный скриншот или URL интерфейса.

Задача: провести UX-анализ экрана и сформулировать рекомендации по улучшению.

Структура ответа:
1. Описание экрана: тип страницы, цель пользователя, ключевые элементы.
2. Целевая аудитория: кто пользуется этим экраном и в каком контексте.
3. Поведение пользователей: типичные сценарии и точки трения.
4. Проблемы и решения: для каждой проблемы укажи приоритет и конкретную рекомендацию.
5. Выводы: краткое резюме ключевых находок.

Пиши на русском языке и опирайся на принципы юзабилити и доступности.";

const RU_JSON: &str = "Ты опытный UX-исследователь. Проанализируй предоставленный интерфейс и верни результат анализа строго в формате JSON.

Ответ должен быть одним JSON-объектом со следующими полями:
- \"screenDescription\": тип экрана, цель пользователя, ключевые элементы, уверенность в оценке.
- \"uxSurvey\": вопросы для пользователей с вариантами ответов и их распределением.
- \"audience\": целевая аудитория, её боли и страхи.
- \"behavior\": пользовательские сценарии, поведенческие паттерны, точки трения.
- \"problemsAndSolutions\": список проблем с приоритетом, решением и ожидаемым эффектом.
- \"selfCheck\": чек-лист проверки качества анализа и уровень уверенности.

Не оборачивай ответ в markdown и не добавляй пояснений до или после JSON.
Все текстовые значения пиши на русском языке.";

const RU_JSON_STRUCTURED: &str = "Ты эксперт по UX-анализу. Проанализируй интерфейс и верни структурированный результат в формате JSON.

Строго соблюдай структуру: один корневой объект с полями
\"screenDescription\", \"uxSurvey\", \"audience\", \"behavior\", \"problemsAndSolutions\", \"selfCheck\".
1. screenDescription: описание экрана и ключевых элементов.
2. uxSurvey: пять вопросов опроса с вариантами ответов.
3. audience: сегменты аудитории, их боли и ожидания.
4. behavior: сценарии использования и точки трения.
5. problemsAndSolutions: проблемы, приоритет, решения и ожидаемый эффект.
6. selfCheck: самопроверка полноты и уверенности.

Не используй markdown и блоки кода, верни только валидный JSON.";

const RU_AB_TEST: &str = "Ты специалист по продуктовым экспериментам. Проанализируй интерфейс и предложи A/B тесты для улучшения UX.

Для каждого теста укажи:
1. Гипотезу: что меняем и почему это улучшит опыт пользователя.
2. Вариант A (контроль) и вариант B (изменение).
3. Целевую метрику и вторичные метрики.
4. Ожидаемый эффект и приоритет теста.
5. Необходимый размер выборки и длительность эксперимента.

Предложи от трёх до пяти тестов, начиная с самых перспективных.";

const RU_BUSINESS_ANALYTICS: &str = "Ты аналитик продукта. Проанализируй интерфейс с точки зрения бизнес-показателей.

Задача: оценить, как текущий UX влияет на конверсию, удержание и выручку.
1. Ключевые бизнес-метрики, на которые влияет экран.
2. Точки потери конверсии в воронке и их вероятные причины.
3. Оценка влияния найденных проблем на выручку.
4. Рекомендации по улучшению с оценкой ожидаемого роста метрик.

Опирайся на типичные отраслевые ориентиры и явно отмечай допущения.";

const RU_HYPOTHESES: &str = "Ты продуктовый исследователь. Проанализируй интерфейс и сформулируй продуктовые гипотезы.

Для каждой гипотезы укажи:
1. Формулировку в виде «Если мы изменим X, то метрика Y вырастет, потому что Z».
2. Проблему пользователя, на которую направлена гипотеза.
3. Способ проверки и критерий успеха.
4. Приоритет по модели ICE: влияние, уверенность, простота.

Отсортируй гипотезы по приоритету, начиная с самых важных.";

// ==================== English References ====================

const EN_MAIN: &str = "You are an experienced UX researcher. Analyze the provided screenshot or interface URL.

Task: perform a UX analysis of the screen and formulate recommendations for improvement.

Response structure:
1. Screen description: page type, user goal, key elements.
2. Target audience: who uses this screen and in what context.
3. User behavior: typical scenarios and friction points.
4. Problems and solutions: for each problem give a priority and a concrete recommendation.
5. Conclusions: a short summary of the key findings.

Write in English and rely on usability and accessibility principles.";

const EN_JSON: &str = "You are an experienced UX researcher. Analyze the provided interface and return the analysis result strictly as JSON.

The response must be a single JSON object with the following fields:
- \"screenDescription\": screen type, user goal, key elements, confidence of the assessment.
- \"uxSurvey\": questions for users with answer options and their distribution.
- \"audience\": target audience, its pains and fears.
- \"behavior\": user scenarios, behavioral patterns, friction points.
- \"problemsAndSolutions\": list of problems with priority, solution and expected impact.
- \"selfCheck\": checklist for verifying analysis quality and the confidence level.

Do not wrap the response in markdown and do not add explanations before or after the JSON.
Write all text values in English.";

const EN_JSON_STRUCTURED: &str = "You are a UX analysis expert. Analyze the interface and return a structured result as JSON.

Strictly follow the structure: one root object with the fields
\"screenDescription\", \"uxSurvey\", \"audience\", \"behavior\", \"problemsAndSolutions\", \"selfCheck\".
1. screenDescription: description of the screen and its key elements.
2. uxSurvey: five survey questions with answer options.
3. audience: audience segments, their pains and expectations.
4. behavior: usage scenarios and friction points.
5. problemsAndSolutions: problems, priority, solutions and expected impact.
6. selfCheck: self-check of completeness and confidence.

Do not use markdown or code blocks; return only valid JSON.";

const EN_AB_TEST: &str = "You are a product experimentation specialist. Analyze the interface and propose A/B tests to improve the UX.

For each test specify:
1. The hypothesis: what changes and why it will improve the user experience.
2. Variant A (control) and variant B (change).
3. The primary metric and secondary metrics.
4. The expected effect and the priority of the test.
5. The required sample size and experiment duration.

Propose three to five tests, starting with the most promising ones.";

const EN_BUSINESS_ANALYTICS: &str = "You are a product analyst. Analyze the interface from the perspective of business performance.

Task: assess how the current UX affects conversion, retention and revenue.
1. Key business metrics affected by the screen.
2. Conversion drop-off points in the funnel and their likely causes.
3. Estimated impact of the identified problems on revenue.
4. Recommendations for improvement with the expected metric growth.

Rely on typical industry benchmarks and state your assumptions explicitly.";

const EN_HYPOTHESES: &str = "You are a product researcher. Analyze the interface and formulate product hypotheses.

For each hypothesis specify:
1. A statement of the form \"If we change X, metric Y will grow because Z\".
2. The user problem the hypothesis addresses.
3. The validation method and the success criterion.
4. The priority according to the ICE model: impact, confidence, ease.

Sort the hypotheses by priority, starting with the most important ones.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curated_registry_covers_every_kind_and_language() {
        let registry = StableTemplateRegistry::new();
        for language in Language::all() {
            for kind in PromptType::ALL {
                let entry = registry
                    .get(kind, language)
                    .unwrap_or_else(|| panic!("missing {} / {}", kind, language));
                assert_eq!(entry.quality.language, language);
                assert!(entry.quality.tested);
            }
        }
        assert_eq!(registry.len(), 12);
    }

    #[test]
    fn test_references_contain_required_keywords() {
        let registry = StableTemplateRegistry::new();
        for language in Language::all() {
            for kind in PromptType::ALL {
                let entry = registry.get(kind, language).expect("entry");
                assert!(
                    kind.missing_keywords(&entry.content, language).is_empty(),
                    "{} / {} is missing keywords",
                    kind,
                    language
                );
                assert!(kind.missing_output_fields(&entry.content).is_empty());
            }
        }
    }

    #[test]
    fn test_similarity_to_itself() {
        let registry = StableTemplateRegistry::new();
        let reference = registry.get(PromptType::Main, Language::RUSSIAN).expect("entry");

        let report = registry
            .similarity_to(&reference.content, PromptType::Main, Language::RUSSIAN)
            .expect("report");

        assert!((report.score - 100.0).abs() < 1e-9);
        assert!((report.similarity - 1.0).abs() < 1e-9);
        assert!(report.issues.is_empty());
        assert!(report.is_valid);
    }

    #[test]
    fn test_similarity_of_unrelated_text_is_low() {
        let registry = StableTemplateRegistry::new();
        let report = registry
            .similarity_to("Плохой промпт", PromptType::Main, Language::RUSSIAN)
            .expect("report");

        assert!(report.similarity < 0.1);
        assert_eq!(report.missing_phrase_count(), 5);
        assert!(!report.is_valid);
    }

    #[test]
    fn test_similarity_penalizes_missing_phrases() {
        let registry = StableTemplateRegistry::new();
        let reference = registry.get(PromptType::Main, Language::ENGLISH).expect("entry");
        let first = key_phrases(&reference.content)[0].clone();
        let altered = reference.content.replacen(&first, &"x".repeat(first.chars().count()), 1);

        let report = registry
            .similarity_to(&altered, PromptType::Main, Language::ENGLISH)
            .expect("report");

        assert!((report.similarity - 0.9).abs() < 1e-9);
        assert_eq!(report.missing_phrase_count(), 1);
        assert!(!report.is_valid, "any missing phrase is an issue");
    }

    #[test]
    fn test_similarity_without_reference() {
        let registry = StableTemplateRegistry::empty();
        assert!(registry
            .similarity_to("anything", PromptType::Main, Language::RUSSIAN)
            .is_none());
    }

    #[test]
    fn test_key_phrases_bounds() {
        let text = "Short. This sentence is long enough to count! Another qualifying segment here?\n\
                    tiny\n";
        let phrases = key_phrases(text);
        assert_eq!(
            phrases,
            vec![
                "This sentence is long enough to count".to_string(),
                "Another qualifying segment here".to_string()
            ]
        );
    }

    #[test]
    fn test_key_phrases_takes_first_five() {
        let text = (1..=8)
            .map(|i| format!("Segment number {} of the text", i))
            .collect::<Vec<_>>()
            .join(". ");
        let phrases = key_phrases(&text);
        assert_eq!(phrases.len(), 5);
        assert_eq!(phrases[0], "Segment number 1 of the text");
        assert_eq!(phrases[4], "Segment number 5 of the text");
    }

    #[test]
    fn test_is_stable_content() {
        let registry = StableTemplateRegistry::new();
        let reference = registry.get(PromptType::Hypotheses, Language::ENGLISH).expect("entry");
        assert!(registry.is_stable_content(
            PromptType::Hypotheses,
            Language::ENGLISH,
            &reference.content
        ));
        assert!(!registry.is_stable_content(PromptType::Hypotheses, Language::ENGLISH, "other"));
    }
}
