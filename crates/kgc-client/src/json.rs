//! Recovery of structured payloads from LM text output
//!
//! Models wrap their JSON in code fences, preambles, or single-object
//! envelopes more often than they return a clean array. The ladder here
//! tries progressively more forgiving readings before giving up:
//! direct parse, fence stripping, first embedded array or object, then
//! well-known wrapper keys.

use regex::Regex;
use serde_json::Value;

use kgc_core::{ClientError, ClientResult, RawItem};

/// Wrapper keys some models put their item list under.
const WRAPPER_KEYS: [&str; 5] = ["items", "triples", "data", "results", "extractions"];

/// Parse LM output text into raw payload items.
///
/// An empty response yields an empty list, not an error; text with no
/// recoverable JSON at all is a [`ClientError::Parse`].
pub fn parse_items(text: &str) -> ClientResult<Vec<RawItem>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    let value = recover_json(trimmed).ok_or_else(|| {
        let preview: String = trimmed.chars().take(200).collect();
        ClientError::Parse(format!("no JSON payload in model output: {preview}"))
    })?;

    Ok(items_from_value(value))
}

/// Try progressively more forgiving readings of the text.
fn recover_json(text: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str(text) {
        return Some(value);
    }

    // Strip a markdown code fence, if any
    let fence = Regex::new(r"```(?:json)?\s*([\s\S]*?)```").ok()?;
    if let Some(captures) = fence.captures(text) {
        if let Some(inner) = captures.get(1) {
            if let Ok(value) = serde_json::from_str(inner.as_str().trim()) {
                return Some(value);
            }
        }
    }

    // Fall back to the outermost bracketed span
    extract_span(text, '[', ']').or_else(|| extract_span(text, '{', '}'))
}

fn extract_span(text: &str, open: char, close: char) -> Option<Value> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Flatten a recovered JSON value into payload items.
fn items_from_value(value: Value) -> Vec<RawItem> {
    match value {
        Value::Array(items) => items.iter().map(RawItem::from_value).collect(),
        Value::Object(ref map) => {
            for key in WRAPPER_KEYS {
                if let Some(Value::Array(items)) = map.get(key) {
                    return items.iter().map(RawItem::from_value).collect();
                }
            }
            // A bare object is taken as a single item
            vec![RawItem::from_value(&value)]
        }
        _ => Vec::new(),
    }
}
