//! Best-effort extraction of JSON from LLM responses
//!
//! Models wrap JSON in prose or code fences more often than not, so parsing
//! tries the whole text, then a fenced block, then the first decodable
//! object/array start.

use anyhow::{anyhow, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json)?\s*(\{.*?\}|\[.*?\])\s*```").unwrap()
});

/// Concatenate the text blocks of an Anthropic Messages response body
pub fn extract_text_blocks(body: &Value) -> String {
    body.get("content")
        .and_then(Value::as_array)
        .map(|blocks| {
            blocks
                .iter()
                .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
                .filter_map(|block| block.get("text").and_then(Value::as_str))
                .map(str::trim)
                .filter(|text| !text.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

/// Load JSON from text that may carry formatting wrappers
pub fn loads_best_effort(raw: &str) -> Result<Value> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(anyhow!("empty response"));
    }

    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }

    if let Some(captures) = FENCED_JSON.captures(text) {
        if let Ok(value) = serde_json::from_str(captures[1].trim()) {
            return Ok(value);
        }
    }

    for (index, _) in text.match_indices(['{', '[']) {
        let mut stream = serde_json::Deserializer::from_str(&text[index..]).into_iter::<Value>();
        if let Some(Ok(value)) = stream.next() {
            return Ok(value);
        }
    }

    Err(anyhow!("unable to parse JSON payload"))
}
