//! Recovery of structured (JSON) output from generated text.
//!
//! Generated JSON often arrives wrapped in code fences, surrounded by prose,
//! or cut off mid-value. Parsing goes from strict to increasingly lenient:
//! strict parse, structural repair, and finally per-field extraction.

use crate::prompts::STRUCTURED_OUTPUT_FIELDS;
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::OnceLock;
use tracing::debug;

static FIELD_REGEXES: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();

/// How a structured response was recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParseStrategy {
    /// Valid JSON after removing fences and prose
    Strict,
    /// Valid after closing strings and delimiters
    Repaired,
    /// Individual top-level fields located and parsed one by one
    FieldExtraction,
    /// Nothing recoverable; every field is a placeholder
    Fallback,
}

/// An analysis object that always carries every structured output field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedAnalysis {
    pub value: Value,
    pub strategy: ParseStrategy,
    /// Fields taken from the response
    pub recovered_fields: Vec<String>,
    /// Fields filled with placeholders
    pub defaulted_fields: Vec<String>,
}

impl ParsedAnalysis {
    pub fn is_complete(&self) -> bool {
        self.defaulted_fields.is_empty()
    }
}

/// Parse generated text into JSON, repairing it when needed.
///
/// Returns `None` only when no JSON value can be recovered at all.
pub fn parse(raw: &str) -> Option<Value> {
    parse_with_strategy(raw).map(|(value, _)| value)
}

fn parse_with_strategy(raw: &str) -> Option<(Value, ParseStrategy)> {
    let candidate = extract_candidate(raw)?;

    if let Some(value) = parse_leading_value(candidate) {
        return Some((value, ParseStrategy::Strict));
    }

    repair(candidate).map(|value| (value, ParseStrategy::Repaired))
}

/// Parse a generated UX analysis. Never fails.
///
/// Missing fields get placeholder values so downstream consumers can rely on
/// every structured output field being present.
pub fn parse_analysis(raw: &str) -> ParsedAnalysis {
    if let Some((Value::Object(object), strategy)) = parse_with_strategy(raw) {
        if has_known_field(&object) {
            return complete_analysis(object, strategy);
        }
    }

    let source = strip_code_fence(raw);
    let mut object = Map::new();
    for (field, regex) in field_regexes() {
        if let Some(value) = extract_field(source, regex) {
            object.insert(field.to_string(), value);
        }
    }

    let strategy = if object.is_empty() {
        ParseStrategy::Fallback
    } else {
        ParseStrategy::FieldExtraction
    };
    debug!(
        "Structured response recovered by {:?} ({} fields)",
        strategy,
        object.len()
    );
    object.insert(
        "metadata".to_string(),
        json!({ "recovered": true, "strategy": strategy }),
    );

    complete_analysis(object, strategy)
}

fn has_known_field(object: &Map<String, Value>) -> bool {
    STRUCTURED_OUTPUT_FIELDS
        .iter()
        .any(|field| object.contains_key(*field))
}

fn complete_analysis(mut object: Map<String, Value>, strategy: ParseStrategy) -> ParsedAnalysis {
    let mut recovered_fields = Vec::new();
    let mut defaulted_fields = Vec::new();

    for field in STRUCTURED_OUTPUT_FIELDS {
        if object.contains_key(field) {
            recovered_fields.push(field.to_string());
        } else {
            object.insert(field.to_string(), placeholder(field));
            defaulted_fields.push(field.to_string());
        }
    }

    ParsedAnalysis {
        value: Value::Object(object),
        strategy,
        recovered_fields,
        defaulted_fields,
    }
}

fn placeholder(field: &str) -> Value {
    match field {
        "screenDescription" => json!({
            "pageType": "unknown",
            "userGoal": "",
            "keyElements": [],
            "confidence": 0
        }),
        "uxSurvey" => json!({ "questions": [], "summary": {} }),
        "audience" => json!({ "targetAudience": "", "mainPain": "", "fears": [] }),
        "behavior" => json!({
            "userScenarios": [],
            "behavioralPatterns": "",
            "frictionPoints": []
        }),
        "problemsAndSolutions" => json!([]),
        "selfCheck" => json!({ "checklist": {}, "confidence": {} }),
        _ => Value::Null,
    }
}

/// Slice starting at the first `{` or `[`, after removing code fences.
fn extract_candidate(raw: &str) -> Option<&str> {
    let unfenced = strip_code_fence(raw);
    let start = unfenced.find(['{', '['])?;
    Some(unfenced[start..].trim())
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(open) = raw.find("```") else {
        return raw;
    };
    let after_fence = &raw[open + 3..];
    // Skip the info string (e.g. "json") up to the end of the fence line.
    let body = match after_fence.find('\n') {
        Some(newline) => &after_fence[newline + 1..],
        None => after_fence,
    };
    match body.find("```") {
        Some(close) => &body[..close],
        None => body,
    }
}

/// Parse the first JSON value in `text`, ignoring anything after it.
fn parse_leading_value(text: &str) -> Option<Value> {
    let mut stream = serde_json::Deserializer::from_str(text).into_iter::<Value>();
    match stream.next() {
        Some(Ok(value)) => Some(value),
        _ => None,
    }
}

/// A point outside strings where the text can be cut and closed: just
/// before a comma or just after an opening delimiter.
struct SafeCut {
    index: usize,
    closers: Vec<char>,
}

/// Close an interrupted JSON document.
///
/// Scans the text tracking strings, escapes and open delimiters. The scan
/// drops commas that directly precede a closer. The result is completed by
/// closing an open string, dropping a dangling comma, giving a dangling colon
/// a `null` value and appending the missing closers in nesting order. When
/// that still does not parse, the text is cut back to the last safe point
/// and closed again, moving further back until something parses.
fn repair(candidate: &str) -> Option<Value> {
    let mut out = String::with_capacity(candidate.len() + 8);
    let mut closers: Vec<char> = Vec::new();
    let mut cuts: Vec<SafeCut> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for c in candidate.chars() {
        if in_string {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => {
                in_string = true;
                out.push(c);
            }
            '{' | '[' => {
                closers.push(if c == '{' { '}' } else { ']' });
                out.push(c);
                cuts.push(SafeCut {
                    index: out.len(),
                    closers: closers.clone(),
                });
            }
            '}' | ']' => {
                drop_trailing_comma(&mut out);
                cuts.retain(|cut| cut.index <= out.len());
                closers.pop();
                out.push(c);
                if closers.is_empty() {
                    break;
                }
            }
            ',' => {
                cuts.push(SafeCut {
                    index: out.len(),
                    closers: closers.clone(),
                });
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    if let Some(value) = close_and_parse(&out, &closers) {
        return Some(value);
    }

    for cut in cuts.iter().rev() {
        if let Some(value) = close_and_parse(&out[..cut.index], &cut.closers) {
            return Some(value);
        }
    }

    None
}

fn close_and_parse(text: &str, closers: &[char]) -> Option<Value> {
    let mut closed = text.trim_end().to_string();
    if closed.ends_with(',') {
        closed.pop();
    }
    if closed.trim_end().ends_with(':') {
        closed.push_str("null");
    }
    closed.extend(closers.iter().rev());
    serde_json::from_str(&closed).ok()
}

fn drop_trailing_comma(out: &mut String) {
    let trimmed_len = out.trim_end().len();
    if out[..trimmed_len].ends_with(',') {
        out.truncate(trimmed_len - 1);
    }
}

fn field_regexes() -> &'static [(&'static str, Regex)] {
    FIELD_REGEXES.get_or_init(|| {
        STRUCTURED_OUTPUT_FIELDS
            .iter()
            .map(|field| {
                let pattern = format!(r#""{}"\s*:\s*"#, regex::escape(field));
                (*field, Regex::new(&pattern).unwrap())
            })
            .collect()
    })
}

/// Locate a field by its key and parse the value that follows it.
fn extract_field(text: &str, key: &Regex) -> Option<Value> {
    let found = key.find(text)?;
    let rest = &text[found.end()..];
    let value_text = balanced_value(rest)?;
    parse_leading_value(value_text).or_else(|| repair(value_text))
}

/// The text of one JSON value at the start of `text`, up to its matching
/// closer or to the end of the text when it never closes.
fn balanced_value(text: &str) -> Option<&str> {
    let first = text.chars().next()?;
    match first {
        '{' | '[' => {
            let mut depth = 0usize;
            let mut in_string = false;
            let mut escaped = false;
            for (index, c) in text.char_indices() {
                if in_string {
                    if escaped {
                        escaped = false;
                    } else if c == '\\' {
                        escaped = true;
                    } else if c == '"' {
                        in_string = false;
                    }
                    continue;
                }
                match c {
                    '"' => in_string = true,
                    '{' | '[' => depth += 1,
                    '}' | ']' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            return Some(&text[..index + c.len_utf8()]);
                        }
                    }
                    _ => {}
                }
            }
            Some(text)
        }
        '"' => {
            let mut escaped = false;
            for (index, c) in text.char_indices().skip(1) {
                if escaped {
                    escaped = false;
                } else if c == '\\' {
                    escaped = true;
                } else if c == '"' {
                    return Some(&text[..index + 1]);
                }
            }
            Some(text)
        }
        _ => {
            let end = text.find([',', '}', ']', '\n']).unwrap_or(text.len());
            let primitive = text[..end].trim();
            (!primitive.is_empty()).then_some(primitive)
        }
    }
}
