//! Parsing of model output into records.

use std::sync::LazyLock;

use regex::Regex;
use sanpai_core::ExtractedRecord;
use serde_json::Value;

use crate::error::ExtractError;

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*[ \t]*\r?\n?(.*?)\s*```\s*$").expect("valid fence regex")
});

/// Parses a model response into records.
///
/// Accepts a bare JSON array, an array wrapped in a markdown code fence, or
/// an array embedded in surrounding prose (the first balanced `[...]` span is
/// used). Unknown keys and non-scalar values are dropped.
///
/// # Errors
///
/// Returns [`ExtractError::RecordParse`] when no array is found, the span is
/// not valid JSON, or an element is not an object.
pub fn parse_record_array(text: &str) -> Result<Vec<ExtractedRecord>, ExtractError> {
    let unfenced = CODE_FENCE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str());

    let span = first_array_span(unfenced)
        .ok_or_else(|| ExtractError::RecordParse("no JSON array in response".to_string()))?;

    let items: Vec<Value> =
        serde_json::from_str(span).map_err(|e| ExtractError::RecordParse(e.to_string()))?;

    items
        .iter()
        .map(|item| {
            item.as_object()
                .map(ExtractedRecord::from_json_object)
                .ok_or_else(|| ExtractError::RecordParse(format!("array element is not an object: {item}")))
        })
        .collect()
}

/// Returns the first balanced `[...]` span, ignoring brackets inside JSON
/// string literals.
fn first_array_span(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}
