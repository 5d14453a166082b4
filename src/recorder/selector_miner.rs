//! Selector Mining
//!
//! Proposes ways to re-locate the element an action targeted, ranked by how
//! stable each strategy tends to be across page loads:
//!
//! Priority order: explicit hint > id > role+name > text > css/classes > xpath
//!
//! # Scoring Rules
//! - **Explicit hint** (`payload.selector`): 1.1, always wins
//! - **DOM id**: 1.0
//! - **ARIA role + accessible name**: 0.9
//! - **Visible text** (1-80 chars): 0.7
//! - **CSS path / class list**: 0.3
//! - **XPath**: css weight - 0.1
//!
//! All weights except the hint come from [`SelectorWeights`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

use crate::events::{ActionEvent, DomSnapshot};

/// Score given to a selector supplied by the recording instrumentation
pub const EXPLICIT_HINT_SCORE: f64 = 1.1;

/// Longest visible text still considered a useful locator
const MAX_TEXT_LEN: usize = 80;

/// At most this many classes are joined into a synthesized class selector
const MAX_CLASSES: usize = 3;

/// Where a selector candidate came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorOrigin {
    /// Explicit hint from the browser-use instrumentation
    BrowserUse,
    DomId,
    AriaRole,
    Text,
    CssPath,
    Classlist,
    Xpath,
}

impl SelectorOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            SelectorOrigin::BrowserUse => "browser_use",
            SelectorOrigin::DomId => "dom_id",
            SelectorOrigin::AriaRole => "aria_role",
            SelectorOrigin::Text => "text",
            SelectorOrigin::CssPath => "css_path",
            SelectorOrigin::Classlist => "classlist",
            SelectorOrigin::Xpath => "xpath",
        }
    }
}

impl fmt::Display for SelectorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A selector candidate with its score and provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorCandidate {
    pub value: String,
    /// Higher is better
    pub score: f64,
    pub origin: SelectorOrigin,
}

impl SelectorCandidate {
    fn new(value: impl Into<String>, score: f64, origin: SelectorOrigin) -> Self {
        Self {
            value: value.into(),
            score,
            origin,
        }
    }

    /// Get a short representation for log lines
    pub fn short_repr(&self) -> String {
        format!("{}=\"{}\"", self.origin, self.value)
    }
}

/// Tunable heuristic weights
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorWeights {
    pub id: f64,
    pub role: f64,
    pub text: f64,
    pub css: f64,
}

impl Default for SelectorWeights {
    fn default() -> Self {
        Self {
            id: 1.0,
            role: 0.9,
            text: 0.7,
            css: 0.3,
        }
    }
}

/// Generates ranked selector candidates from a DOM snapshot
#[derive(Debug, Clone, Default)]
pub struct SelectorMiner {
    weights: SelectorWeights,
}

impl SelectorMiner {
    pub fn new(weights: SelectorWeights) -> Self {
        Self { weights }
    }

    /// Mine candidates for an event, best first. Empty when no DOM was captured.
    pub fn mine(&self, event: &ActionEvent) -> Vec<SelectorCandidate> {
        match &event.dom_snapshot {
            Some(snapshot) => self.rank(snapshot, event.selector_hint()),
            None => Vec::new(),
        }
    }

    fn rank(&self, snapshot: &DomSnapshot, hint: Option<&str>) -> Vec<SelectorCandidate> {
        let w = &self.weights;
        let mut candidates = Vec::new();

        // 1. Explicit hint
        if let Some(hint) = hint {
            candidates.push(SelectorCandidate::new(
                hint,
                EXPLICIT_HINT_SCORE,
                SelectorOrigin::BrowserUse,
            ));
        }

        // 2. DOM id
        if let Some(id) = non_empty(&snapshot.id) {
            candidates.push(SelectorCandidate::new(
                format!("#{}", id),
                w.id,
                SelectorOrigin::DomId,
            ));
        }

        // 3. Role + accessible name
        if let (Some(role), Some(name)) = (non_empty(&snapshot.role), non_empty(&snapshot.name)) {
            candidates.push(SelectorCandidate::new(
                format!(
                    "getByRole('{}', {{ name: '{}' }})",
                    quote(role),
                    quote(name)
                ),
                w.role,
                SelectorOrigin::AriaRole,
            ));
        }

        // 4. Visible text
        if let Some(text) = snapshot.text.as_deref().map(str::trim) {
            let len = text.chars().count();
            if (1..=MAX_TEXT_LEN).contains(&len) {
                candidates.push(SelectorCandidate::new(
                    format!("getByText('{}')", quote(text)),
                    w.text,
                    SelectorOrigin::Text,
                ));
            }
        }

        // 5. CSS path, else synthesized class selector
        if let Some(css_path) = non_empty(&snapshot.css_path) {
            candidates.push(SelectorCandidate::new(
                css_path,
                w.css,
                SelectorOrigin::CssPath,
            ));
        } else {
            let classes: Vec<&str> = snapshot
                .classes
                .iter()
                .map(|c| c.trim())
                .filter(|c| !c.is_empty())
                .take(MAX_CLASSES)
                .collect();
            if !classes.is_empty() {
                candidates.push(SelectorCandidate::new(
                    format!("{}.{}", snapshot.tag, classes.join(".")),
                    w.css,
                    SelectorOrigin::Classlist,
                ));
            }
        }

        // 6. XPath
        if let Some(xpath) = non_empty(&snapshot.xpath) {
            candidates.push(SelectorCandidate::new(
                xpath,
                w.css - 0.1,
                SelectorOrigin::Xpath,
            ));
        }

        // Stable: equal scores keep generation order
        candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

        let mut seen = HashSet::new();
        candidates.retain(|c| seen.insert(c.value.clone()));
        candidates
    }

    /// JSON form stored in node metadata for audit/debugging
    pub fn serialize(candidates: &[SelectorCandidate]) -> Value {
        serde_json::to_value(candidates).unwrap_or_else(|_| Value::Array(Vec::new()))
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

fn quote(raw: &str) -> String {
    raw.replace('\'', "\\'")
}
