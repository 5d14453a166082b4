//! Deterministic chart designer used when no inference provider is available

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map};

use super::types::{ChartHistoryEntry, ChartSource, ExecutionMode, FlowChart, FlowChartStep};
use super::FlowChartDesigner;
use crate::error::{ModelerError, Result};
use crate::events::ActionType;
use crate::graph::{FlowGraph, FlowNode};

const REASON_EMPTY_GRAPH: &str = "empty-graph";
const REASON_NO_PROVIDER: &str = "missing-api-key";

/// Builds charts straight from node intents and selectors
#[derive(Debug, Clone)]
pub struct HeuristicChartDesigner {
    model: String,
}

impl HeuristicChartDesigner {
    /// `model` is only recorded on the chart for provenance
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    fn step_for(node: &FlowNode) -> FlowChartStep {
        let summary = node.intent.summary.trim();
        let fallback_title = if summary.is_empty() {
            title_case(node.event.action_type.as_str())
        } else {
            summary.to_string()
        };
        let fallback_description = if summary.is_empty() {
            node.event.action_type.as_str()
        } else {
            summary
        };

        let mut hints = Map::new();
        hints.insert(
            "semantic_action".to_string(),
            json!(node.intent.semantic_action),
        );
        hints.insert("user_value".to_string(), json!(node.intent.user_value));
        hints.insert("confidence".to_string(), json!(node.intent.confidence));

        FlowChartStep {
            node_id: node.node_id.clone(),
            order: node.event.order,
            title: ensure_title(None, Some(&fallback_title)),
            description: ensure_description(None, Some(fallback_description)),
            execution_mode: suggest_mode(node),
            dom_selectors: node.selectors.clone(),
            hints,
            source: REASON_NO_PROVIDER.to_string(),
        }
    }
}

impl Default for HeuristicChartDesigner {
    fn default() -> Self {
        Self::new("heuristic")
    }
}

#[async_trait]
impl FlowChartDesigner for HeuristicChartDesigner {
    async fn generate(&self, session_id: &str, graph: &FlowGraph) -> FlowChart {
        let steps: Vec<FlowChartStep> = graph.nodes().into_iter().map(Self::step_for).collect();
        let reason = if steps.is_empty() {
            REASON_EMPTY_GRAPH
        } else {
            REASON_NO_PROVIDER
        };

        FlowChart {
            session_id: session_id.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            model: self.model.clone(),
            steps,
            edges: graph.edges().into_iter().collect(),
            source: ChartSource::heuristic(reason),
            history: Vec::new(),
        }
    }

    async fn edit(&self, chart: &FlowChart, instructions: &str) -> Result<FlowChart> {
        let instructions = instructions.trim();
        if instructions.is_empty() {
            return Err(ModelerError::InvalidInstructions(
                "instructions must not be empty".to_string(),
            ));
        }
        if chart.steps.is_empty() {
            return Err(ModelerError::InvalidInstructions(
                "flow chart is empty, generate one before editing".to_string(),
            ));
        }

        let timestamp = Utc::now().to_rfc3339();
        let mut edited = chart.clone();
        edited.generated_at = timestamp.clone();
        edited.model = self.model.clone();
        edited.source = ChartSource {
            operation: Some("edit".to_string()),
            ..ChartSource::heuristic(REASON_NO_PROVIDER)
        };
        edited.history.push(ChartHistoryEntry {
            timestamp,
            instructions: instructions.to_string(),
            status: "fallback".to_string(),
            reason: Some(REASON_NO_PROVIDER.to_string()),
            model: None,
            provider: None,
            notes: None,
        });
        Ok(edited)
    }
}

/// Pick a replay mode from what the recording captured
fn suggest_mode(node: &FlowNode) -> ExecutionMode {
    if node.intent.semantic_action.is_some()
        || matches!(node.event.action_type, ActionType::Other | ActionType::Assert)
    {
        return ExecutionMode::Llm;
    }
    if node.selectors.is_empty() {
        ExecutionMode::Llm
    } else {
        ExecutionMode::Deterministic
    }
}

/// Trimmed title with a capitalized first letter, `Step` when nothing usable is given
pub fn ensure_title(value: Option<&str>, fallback: Option<&str>) -> String {
    let text = pick(value, fallback).unwrap_or("Step");
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => "Step".to_string(),
    }
}

/// Trimmed description ending in punctuation
pub fn ensure_description(value: Option<&str>, fallback: Option<&str>) -> String {
    match pick(value, fallback) {
        None => "Describe the action.".to_string(),
        Some(text) if text.ends_with(['.', '!', '?']) => text.to_string(),
        Some(text) => format!("{}.", text),
    }
}

fn pick<'a>(value: Option<&'a str>, fallback: Option<&'a str>) -> Option<&'a str> {
    [value, fallback]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|text| !text.is_empty())
}

fn title_case(raw: &str) -> String {
    raw.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| ensure_title(Some(word), None))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{normalize, FlowIntent};
    use crate::graph::NodeUpdate;

    fn graph() -> FlowGraph {
        let mut graph = FlowGraph::new();
        let events = [
            json!({ "event_id": "a", "category": "goto" }),
            json!({ "event_id": "b", "category": "click" }),
            json!({ "event_id": "c", "category": "verify" }),
        ];
        for (i, raw) in events.iter().enumerate() {
            let event = normalize(raw, i as u64 + 1);
            let summary = event.short_description();
            graph.add_node(FlowNode::new(event, Vec::new(), FlowIntent::new(summary, 0.2)));
        }
        graph
            .update_node("b", NodeUpdate::selectors(vec!["#go".to_string()]))
            .unwrap();
        graph
    }

    #[tokio::test]
    async fn test_generate_follows_event_order() {
        let chart = HeuristicChartDesigner::default()
            .generate("s1", &graph())
            .await;
        assert_eq!(chart.session_id, "s1");
        assert_eq!(chart.source, ChartSource::heuristic("missing-api-key"));

        let ids: Vec<&str> = chart.steps.iter().map(|s| s.node_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        let modes: Vec<ExecutionMode> = chart.steps.iter().map(|s| s.execution_mode).collect();
        assert_eq!(
            modes,
            vec![ExecutionMode::Llm, ExecutionMode::Deterministic, ExecutionMode::Llm]
        );
        assert_eq!(chart.steps[0].title, "Navigate");
        assert_eq!(chart.steps[0].description, "navigate.");
        assert_eq!(chart.steps[1].dom_selectors, vec!["#go"]);
        assert_eq!(chart.steps[1].hints["confidence"], json!(0.2));
        assert_eq!(chart.edges["a"], vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_generate_empty_graph() {
        let chart = HeuristicChartDesigner::default()
            .generate("s1", &FlowGraph::new())
            .await;
        assert!(chart.steps.is_empty());
        assert_eq!(chart.source.reason.as_deref(), Some("empty-graph"));
    }

    #[tokio::test]
    async fn test_edit_appends_history() {
        let designer = HeuristicChartDesigner::default();
        let chart = designer.generate("s1", &graph()).await;
        let edited = designer
            .edit(&chart, "  Add a note describing the outcome. ")
            .await
            .unwrap();
        assert_eq!(edited.steps, chart.steps);
        assert_eq!(edited.source.operation.as_deref(), Some("edit"));
        let last = edited.history.last().unwrap();
        assert_eq!(last.instructions, "Add a note describing the outcome.");
        assert_eq!(last.status, "fallback");
    }

    #[tokio::test]
    async fn test_edit_rejects_blank_and_empty() {
        let designer = HeuristicChartDesigner::default();
        let chart = designer.generate("s1", &graph()).await;
        assert!(matches!(
            designer.edit(&chart, "   ").await,
            Err(ModelerError::InvalidInstructions(_))
        ));

        let empty = designer.generate("s1", &FlowGraph::new()).await;
        assert!(designer.edit(&empty, "rename steps").await.is_err());
    }

    #[test]
    fn test_text_helpers() {
        assert_eq!(ensure_title(Some("  log in "), None), "Log in");
        assert_eq!(ensure_title(Some(""), Some("")), "Step");
        assert_eq!(ensure_description(Some("Done!"), None), "Done!");
        assert_eq!(ensure_description(None, Some("click")), "click.");
        assert_eq!(ensure_description(None, None), "Describe the action.");
        assert_eq!(title_case("wait_for"), "Wait For");
    }
}
