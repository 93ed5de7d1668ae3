/// Localized prompt fragments and detection vocabularies for one language.
///
/// Directive headings double as idempotence markers: a template that already
/// contains a heading's marker text is not patched again.
#[derive(Debug, Clone)]
pub struct LanguageStrings {
    // ==================== Context Merge ====================
    /// Heading placed above business context merged into a prompt
    pub context_heading: &'static str,

    /// One-line instruction placed after merged context
    pub context_instruction: &'static str,

    // ==================== Correction Directives ====================
    /// Marker text of the response-language directive
    pub language_marker: &'static str,

    /// Body of the response-language directive
    /// Placeholders: {language}
    pub language_directive: &'static str,

    /// Marker text of the completeness directive
    pub completeness_marker: &'static str,

    pub completeness_directive: &'static str,

    /// Marker text of the structure directive
    pub structure_marker: &'static str,

    pub structure_directive: &'static str,

    // ==================== Detection Vocabularies ====================
    /// Lowercase stems that identify an instruction/analysis request
    pub instruction_keywords: &'static [&'static str],

    /// Lowercase stems of the sections a complete analysis mentions
    pub section_markers: &'static [&'static str],

    /// Lowercase negations that, on a line mentioning markdown, form a
    /// "do not wrap in markdown" clause
    pub markdown_negations: &'static [&'static str],
}

// ==================== Russian Strings ====================

/// Russian language strings (default)
pub const RUSSIAN_STRINGS: LanguageStrings = LanguageStrings {
    context_heading: "## Дополнительный контекст",
    context_instruction: "Учитывай этот контекст при анализе и формулировке рекомендаций.",

    language_marker: "ЯЗЫК ОТВЕТА",
    language_directive: "Отвечай строго на языке: {language}. Не смешивай языки, все разделы и пояснения пиши только на этом языке.",
    completeness_marker: "ПОЛНОТА ОТВЕТА",
    completeness_directive: "Заполни все разделы анализа до конца. Не обрывай ответ на середине и заверши каждый раздел законченным предложением.",
    structure_marker: "СТРУКТУРА ОТВЕТА",
    structure_directive: "Используй заголовки разделов и нумерованные списки. Если требуется JSON, верни только валидный JSON без обёртки в markdown.",

    instruction_keywords: &[
        "проанализируй",
        "анализ",
        "оцени",
        "опиши",
        "выяви",
        "определи",
        "задача",
        "инструкц",
        "сформулируй",
    ],
    section_markers: &["проблем", "рекомендац", "вывод", "аудитор", "поведен"],
    markdown_negations: &["не ", "без "],
};

// ==================== English Strings ====================

/// English language strings
pub const ENGLISH_STRINGS: LanguageStrings = LanguageStrings {
    context_heading: "## Additional context",
    context_instruction: "Take this context into account in your analysis and recommendations.",

    language_marker: "RESPONSE LANGUAGE",
    language_directive: "Respond strictly in {language}. Do not mix languages; write every section and explanation in this language only.",
    completeness_marker: "RESPONSE COMPLETENESS",
    completeness_directive: "Fill in every section of the analysis completely. Do not stop mid-answer and finish each section with a complete sentence.",
    structure_marker: "RESPONSE STRUCTURE",
    structure_directive: "Use section headings and numbered lists. If JSON is requested, return only valid JSON without markdown wrapping.",

    instruction_keywords: &[
        "analy",
        "evaluate",
        "describe",
        "identify",
        "determine",
        "task",
        "instruction",
        "assess",
    ],
    section_markers: &["problem", "recommend", "conclusion", "audience", "behavio"],
    markdown_negations: &["do not", "don't", "never", "without", "no "],
};
