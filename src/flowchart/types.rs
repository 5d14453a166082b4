use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// How a step should be replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Deterministic,
    Llm,
    Hybrid,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Deterministic => "deterministic",
            ExecutionMode::Llm => "llm",
            ExecutionMode::Hybrid => "hybrid",
        }
    }

    /// Map free-form mode text onto a mode; unknown or missing text is deterministic
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        let normalized = raw.unwrap_or_default().trim().to_lowercase();
        match normalized.as_str() {
            "llm" => ExecutionMode::Llm,
            "hybrid" => ExecutionMode::Hybrid,
            "deterministic" | "" => ExecutionMode::Deterministic,
            other if other.contains("llm") => ExecutionMode::Llm,
            other if other.contains("hybrid") => ExecutionMode::Hybrid,
            _ => ExecutionMode::Deterministic,
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowChartStep {
    pub node_id: String,
    pub order: u64,
    pub title: String,
    pub description: String,
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub dom_selectors: Vec<String>,
    #[serde(default)]
    pub hints: Map<String, Value>,
    /// What produced the step ("llm", "missing-api-key", ...)
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSource {
    /// "heuristic" or "llm"
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
}

impl ChartSource {
    pub fn heuristic(reason: &str) -> Self {
        Self {
            kind: "heuristic".to_string(),
            reason: Some(reason.to_string()),
            provider: None,
            model: None,
            operation: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartHistoryEntry {
    pub timestamp: String,
    pub instructions: String,
    /// "success" or "fallback"
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowChart {
    pub session_id: String,
    pub generated_at: String,
    pub model: String,
    pub steps: Vec<FlowChartStep>,
    #[serde(default)]
    pub edges: BTreeMap<String, Vec<String>>,
    pub source: ChartSource,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ChartHistoryEntry>,
}
