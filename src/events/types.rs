use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical action categories recognised by the modeler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Navigate,
    Click,
    Input,
    WaitFor,
    Assert,
    Other,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Navigate => "navigate",
            ActionType::Click => "click",
            ActionType::Input => "input",
            ActionType::WaitFor => "wait_for",
            ActionType::Assert => "assert",
            ActionType::Other => "other",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time capture of the element an action targeted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DomSnapshot {
    pub tag: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub classes: Vec<String>,
    #[serde(default)]
    pub role: Option<String>,
    /// Accessible name
    #[serde(default)]
    pub name: Option<String>,
    /// Visible inner text
    #[serde(default)]
    pub text: Option<String>,
    /// `data-*` attributes with the prefix stripped
    #[serde(default)]
    pub data_attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub xpath: Option<String>,
    #[serde(default)]
    pub css_path: Option<String>,
}

/// Browsing context at the time of an action
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrowserContext {
    pub url: String,
    pub frame: Option<String>,
    pub title: Option<String>,
}

/// Normalized action emitted by the session recorder
#[derive(Debug, Clone, PartialEq)]
pub struct ActionEvent {
    pub event_id: String,
    /// Session-scoped sequence number, starts at 1 and is never reused
    pub order: u64,
    pub occurred_at: DateTime<Utc>,
    pub action_type: ActionType,
    pub context: BrowserContext,
    pub dom_snapshot: Option<DomSnapshot>,
    pub payload: Map<String, Value>,
}

impl ActionEvent {
    /// Human-facing summary used before any annotation, e.g. `click → button submit`
    pub fn short_description(&self) -> String {
        let target = self
            .dom_snapshot
            .as_ref()
            .map(|dom| {
                let ident = dom
                    .id
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .or(dom.name.as_deref())
                    .unwrap_or("");
                format!("{} {}", dom.tag, ident).trim().to_string()
            })
            .unwrap_or_default();

        if target.is_empty() {
            self.action_type.to_string()
        } else {
            format!("{} → {}", self.action_type, target)
        }
    }

    /// Explicit selector hint supplied by the recording instrumentation
    pub fn selector_hint(&self) -> Option<&str> {
        self.payload
            .get("selector")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Intent metadata attached to a flow node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowIntent {
    pub summary: String,
    #[serde(default)]
    pub semantic_action: Option<String>,
    #[serde(default)]
    pub user_value: Option<String>,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

impl FlowIntent {
    pub fn new(summary: impl Into<String>, confidence: f64) -> Self {
        Self {
            summary: summary.into(),
            semantic_action: None,
            user_value: None,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}
