//! Recovery of structured paper metadata from free-text model replies.
//!
//! Each strategy is a pure `fn(&str) -> Option<Value>`; [`recover`] walks
//! them in order and validates the first JSON object produced.

use std::path::Path;

use once_cell::sync::Lazy;
use posterscope_core::{PaperCandidate, UNTITLED};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

static FENCE_JSON: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)```json\s*").expect("static regex"));
static FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```\s*").expect("static regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    Direct,
    Sanitized,
    FirstObject,
    NewlineRepair,
}

type StrategyFn = fn(&str) -> Option<Value>;

/// Strategies in the order they are tried.
pub const STRATEGIES: [(RecoveryStrategy, StrategyFn); 4] = [
    (RecoveryStrategy::Direct, parse_direct),
    (RecoveryStrategy::Sanitized, parse_sanitized),
    (RecoveryStrategy::FirstObject, parse_first_object),
    (RecoveryStrategy::NewlineRepair, parse_newline_repaired),
];

/// Validated fields of a recovered reply.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecoveredPaper {
    pub title: String,
    pub authors: Vec<String>,
    pub overview: Option<String>,
    pub strategy: RecoveryStrategy,
}

impl RecoveredPaper {
    pub fn into_candidate(self, source_path: &Path) -> PaperCandidate {
        PaperCandidate::new(Some(self.title), self.authors, self.overview, source_path)
    }
}

/// Recover paper metadata from a raw reply. `None` when every strategy fails.
pub fn recover(raw: &str) -> Option<RecoveredPaper> {
    if raw.trim().is_empty() {
        return None;
    }

    STRATEGIES.iter().find_map(|(strategy, parse)| {
        match parse(raw) {
            Some(Value::Object(map)) => Some(validate(map, *strategy)),
            _ => None,
        }
    })
}

fn validate(map: Map<String, Value>, strategy: RecoveryStrategy) -> RecoveredPaper {
    let title = match map.get("title") {
        Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => UNTITLED.to_string(),
    };

    let authors = match map.get("authors") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    };

    let overview = match map.get("overview") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    };

    RecoveredPaper {
        title,
        authors,
        overview,
        strategy,
    }
}

fn parse_object(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text)
        .ok()
        .filter(Value::is_object)
}

// ─── Strategies ────────────────────────────────────────────

fn parse_direct(raw: &str) -> Option<Value> {
    parse_object(raw)
}

fn parse_sanitized(raw: &str) -> Option<Value> {
    parse_object(&sanitize(raw))
}

fn parse_first_object(raw: &str) -> Option<Value> {
    parse_object(first_balanced_object(raw)?)
}

fn parse_newline_repaired(raw: &str) -> Option<Value> {
    parse_object(&join_string_newlines(raw))
}

// ─── Helpers ───────────────────────────────────────────────

/// Fences off, prose trimmed to the outer braces, Python-style literals
/// normalized, stray control characters dropped.
pub fn sanitize(raw: &str) -> String {
    let text = FENCE_JSON.replace_all(raw, "");
    let text = FENCE.replace_all(&text, "");

    let trimmed = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => &text[..],
    };

    normalize_literals(trimmed)
        .chars()
        .filter(|&c| c >= ' ' || matches!(c, '\n' | '\r' | '\t'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// Single pass over the text; rewrites only outside double-quoted strings.
///
/// Single-quoted strings become double-quoted, `None`/`True`/`False` become
/// `null`/`true`/`false`, and commas directly before `}` or `]` are dropped.
fn normalize_literals(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                let end = skip_double_quoted(&chars, i);
                out.extend(&chars[i..end]);
                i = end;
            }
            '\'' => {
                out.push('"');
                i += 1;
                while i < chars.len() {
                    match chars[i] {
                        '\\' if chars.get(i + 1) == Some(&'\'') => {
                            out.push('\'');
                            i += 2;
                        }
                        '\\' => {
                            out.push('\\');
                            if let Some(&next) = chars.get(i + 1) {
                                out.push(next);
                            }
                            i += 2;
                        }
                        '"' => {
                            out.push_str("\\\"");
                            i += 1;
                        }
                        '\'' => {
                            i += 1;
                            break;
                        }
                        other => {
                            out.push(other);
                            i += 1;
                        }
                    }
                }
                out.push('"');
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|ch| !ch.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
                i += 1;
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                out.push_str(match word.as_str() {
                    "None" => "null",
                    "True" => "true",
                    "False" => "false",
                    _ => word.as_str(),
                });
            }
            other => {
                out.push(other);
                i += 1;
            }
        }
    }

    out
}

/// Index just past the closing quote of the string starting at `start`.
fn skip_double_quoted(chars: &[char], start: usize) -> usize {
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' => i += 2,
            '"' => return i + 1,
            _ => i += 1,
        }
    }
    chars.len()
}

/// First `{...}` block with balanced braces, ignoring braces inside strings.
fn first_balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
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
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Replace raw line breaks inside double-quoted strings with one space.
fn join_string_newlines(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut in_string = false;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if !in_string {
            if c == '"' {
                in_string = true;
            }
            out.push(c);
            continue;
        }

        if escaped {
            escaped = false;
            out.push(c);
            continue;
        }
        match c {
            '\\' => {
                escaped = true;
                out.push(c);
            }
            '"' => {
                in_string = false;
                out.push(c);
            }
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                out.push(' ');
            }
            '\n' => out.push(' '),
            other => out.push(other),
        }
    }

    out
}
