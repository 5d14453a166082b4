//! Event Normalizer
//!
//! Turns a raw instrumentation payload into an [`ActionEvent`]. Nothing in
//! here fails: unknown categories become [`ActionType::Other`], malformed
//! timestamps become the ingestion time and missing ids are generated.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::types::{ActionEvent, ActionType, BrowserContext, DomSnapshot};

/// Naive ISO-8601 layouts accepted when the timestamp carries no offset
const NAIVE_TIMESTAMP_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Normalize a raw payload, stamping it with the order assigned by the recorder
pub fn normalize(raw: &Value, order: u64) -> ActionEvent {
    let event_id = str_field(raw, "event_id")
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let occurred_at = raw
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(parse_timestamp)
        .unwrap_or_else(Utc::now);

    let context = BrowserContext {
        url: str_field(raw, "url").unwrap_or_default().to_string(),
        frame: str_field(raw, "frame").map(str::to_string),
        title: str_field(raw, "title").map(str::to_string),
    };

    let dom_snapshot = raw
        .get("dom")
        .and_then(Value::as_object)
        .filter(|dom| !dom.is_empty())
        .map(snapshot_from_payload);

    let payload = raw
        .get("payload")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    ActionEvent {
        event_id,
        order,
        occurred_at,
        action_type: resolve_action_type(raw),
        context,
        dom_snapshot,
        payload,
    }
}

/// Classify a payload from its `category` (or `type`) field
pub fn resolve_action_type(raw: &Value) -> ActionType {
    let name = str_field(raw, "category")
        .filter(|s| !s.is_empty())
        .or_else(|| str_field(raw, "type"))
        .unwrap_or("other")
        .trim()
        .to_lowercase();

    match name.as_str() {
        "click" | "press" => ActionType::Click,
        "input" | "type" => ActionType::Input,
        "navigate" | "goto" => ActionType::Navigate,
        "wait" | "wait_for" => ActionType::WaitFor,
        "assert" | "verify" => ActionType::Assert,
        _ => ActionType::Other,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

fn snapshot_from_payload(dom: &Map<String, Value>) -> DomSnapshot {
    let empty = Map::new();
    let attrs = dom
        .get("attributes")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let attr = |key: &str| attrs.get(key).and_then(Value::as_str).map(str::to_string);
    let field = |key: &str| dom.get(key).and_then(Value::as_str).map(str::to_string);

    // Non-string values keep their JSON text
    let data_attributes: BTreeMap<String, String> = attrs
        .iter()
        .filter_map(|(key, value)| {
            let stripped = key.strip_prefix("data-")?;
            let text = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((stripped.to_string(), text))
        })
        .collect();

    let classes = dom
        .get("classList")
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    DomSnapshot {
        tag: field("tag").unwrap_or_else(|| "div".to_string()),
        id: attr("id"),
        classes,
        role: attr("role"),
        name: field("accessibleName"),
        text: field("innerText"),
        data_attributes,
        xpath: field("xpath"),
        css_path: field("cssPath"),
    }
}

fn str_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str)
}
