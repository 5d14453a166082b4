//! Session Recorder
//!
//! Turns raw browser-use telemetry into flow graph nodes, one event at a
//! time: order -> normalize -> mine selectors -> annotate -> append.

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;

use super::selector_miner::SelectorMiner;
use crate::annotator::{
    Annotation, ClaudeAnnotator, FallbackReason, IntentAnnotator, OfflineAnnotator,
};
use crate::events::normalize;
use crate::graph::wire::{META_DOM_SNAPSHOT, META_OCCURRED_AT, META_SELECTOR_CANDIDATES};
use crate::graph::{FlowGraph, FlowNode};
use crate::utils::config::Config;

/// Default upper bound for one annotation call
pub const DEFAULT_ANNOTATION_TIMEOUT: Duration = Duration::from_secs(10);

/// Accumulates action events and incrementally updates the flow graph
pub struct SessionRecorder {
    miner: SelectorMiner,
    annotator: Arc<dyn IntentAnnotator>,
    annotation_timeout: Duration,
    graph: FlowGraph,
    /// Last assigned order; the first event gets 1
    order: u64,
}

impl SessionRecorder {
    pub fn new(miner: SelectorMiner, annotator: Arc<dyn IntentAnnotator>) -> Self {
        Self {
            miner,
            annotator,
            annotation_timeout: DEFAULT_ANNOTATION_TIMEOUT,
            graph: FlowGraph::new(),
            order: 0,
        }
    }

    /// Recorder with default weights and no inference provider
    pub fn offline() -> Self {
        Self::new(SelectorMiner::default(), Arc::new(OfflineAnnotator))
    }

    /// Recorder wired from configuration
    pub fn from_config(config: &Config) -> Self {
        let annotator: Arc<dyn IntentAnnotator> = if config.annotator.is_offline() {
            Arc::new(OfflineAnnotator)
        } else {
            Arc::new(ClaudeAnnotator::from_config(&config.annotator))
        };
        Self::new(SelectorMiner::new(config.selector_weights), annotator)
            .with_annotation_timeout(Duration::from_millis(config.annotator.timeout_ms))
    }

    pub fn with_annotation_timeout(mut self, timeout: Duration) -> Self {
        self.annotation_timeout = timeout;
        self
    }

    /// Ingest one raw event and return the node appended to the graph
    ///
    /// The node only enters the graph once annotation has finished (or timed out).
    pub async fn record_event(&mut self, raw: &Value) -> FlowNode {
        self.order += 1;
        let event = normalize(raw, self.order);
        let candidates = self.miner.mine(&event);

        let annotation =
            match tokio::time::timeout(self.annotation_timeout, self.annotator.annotate(&event))
                .await
            {
                Ok(annotation) => annotation,
                Err(_) => {
                    log::warn!(
                        "Annotation timed out after {:?} for event {}",
                        self.annotation_timeout,
                        event.event_id
                    );
                    Annotation::fallback(&event, FallbackReason::Timeout)
                }
            };
        if let Annotation::Fallback { reason, .. } = &annotation {
            log::debug!("Using fallback intent for {} ({})", event.event_id, reason);
        }

        let mut metadata = Map::new();
        metadata.insert(
            META_SELECTOR_CANDIDATES.to_string(),
            SelectorMiner::serialize(&candidates),
        );
        metadata.insert(
            META_OCCURRED_AT.to_string(),
            Value::String(event.occurred_at.to_rfc3339()),
        );
        if let Some(dom) = &event.dom_snapshot {
            if let Ok(value) = serde_json::to_value(dom) {
                metadata.insert(META_DOM_SNAPSHOT.to_string(), value);
            }
        }

        log::info!(
            "Recorded #{} {} ({})",
            event.order,
            event.short_description(),
            candidates
                .first()
                .map(|c| c.short_repr())
                .unwrap_or_else(|| "no selector".to_string())
        );

        let selectors = candidates.into_iter().map(|c| c.value).collect();
        let mut node = FlowNode::new(event, selectors, annotation.into_intent());
        node.metadata = metadata;

        self.graph.add_node(node.clone());
        node
    }

    pub fn graph(&self) -> &FlowGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut FlowGraph {
        &mut self.graph
    }

    /// Order the next recorded event will receive
    pub fn next_order(&self) -> u64 {
        self.order + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ActionEvent, ActionType, FlowIntent};
    use async_trait::async_trait;
    use serde_json::json;

    fn sample_event() -> Value {
        json!({
            "event_id": "evt-1",
            "timestamp": "2024-07-18T12:00:10",
            "category": "click",
            "url": "https://example.com",
            "dom": {
                "tag": "button",
                "attributes": { "id": "submit", "role": "button" },
                "accessibleName": "Submit order",
                "innerText": "Submit",
                "classList": ["cta", "primary"],
                "cssPath": "button#submit"
            },
            "payload": { "selector": "button#submit" }
        })
    }

    struct SlowAnnotator;

    #[async_trait]
    impl IntentAnnotator for SlowAnnotator {
        async fn annotate(&self, _event: &ActionEvent) -> Annotation {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Annotation::Inferred(FlowIntent::new("too late", 0.9))
        }
    }

    struct EchoAnnotator;

    #[async_trait]
    impl IntentAnnotator for EchoAnnotator {
        async fn annotate(&self, event: &ActionEvent) -> Annotation {
            Annotation::Inferred(FlowIntent {
                summary: format!("do {}", event.action_type),
                semantic_action: Some("submit order".to_string()),
                user_value: None,
                confidence: 0.9,
            })
        }
    }

    #[tokio::test]
    async fn test_session_recorder_builds_flow_graph() {
        let mut recorder = SessionRecorder::offline();
        let node = recorder.record_event(&sample_event()).await;
        assert!(node.intent.summary.starts_with("click"));
        assert_eq!(node.intent.confidence, 0.2);

        let graph = recorder.graph();
        assert_eq!(graph.len(), 1);
        let stored = graph.get("evt-1").unwrap();
        assert_eq!(stored.selectors[..2], ["button#submit", "#submit"]);
        assert_eq!(stored, &node);
    }

    #[tokio::test]
    async fn test_metadata_keeps_full_candidate_list() {
        let mut recorder = SessionRecorder::offline();
        let node = recorder.record_event(&sample_event()).await;

        let candidates = node.metadata[META_SELECTOR_CANDIDATES].as_array().unwrap();
        assert_eq!(candidates.len(), node.selectors.len());
        assert_eq!(candidates[0]["origin"], "browser_use");
        assert_eq!(candidates[1]["value"], "#submit");
        assert_eq!(node.metadata[META_OCCURRED_AT], "2024-07-18T12:00:10+00:00");
        assert_eq!(node.metadata[META_DOM_SNAPSHOT]["tag"], "button");
    }

    #[tokio::test]
    async fn test_orders_increase_and_chain() {
        let mut recorder = SessionRecorder::offline();
        let first = recorder
            .record_event(&json!({ "event_id": "E1", "category": "click" }))
            .await;
        let second = recorder
            .record_event(&json!({ "event_id": "E2", "category": "input" }))
            .await;
        assert_eq!(first.event.order, 1);
        assert_eq!(second.event.order, 2);
        assert_eq!(second.event.action_type, ActionType::Input);

        let edges = recorder.graph().edges();
        assert_eq!(edges["E1"], vec!["E2".to_string()]);
        assert!(edges["E2"].is_empty());
        assert_eq!(recorder.graph().entry(), Some("E1"));

        recorder.graph_mut().prune_after("E1").unwrap();
        assert_eq!(recorder.graph().len(), 1);
        assert_eq!(recorder.graph().entry(), Some("E1"));

        // Orders are never reused after pruning
        let third = recorder.record_event(&json!({ "category": "wait" })).await;
        assert_eq!(third.event.order, 3);
        assert_eq!(recorder.next_order(), 4);
        assert_eq!(recorder.graph().successors("E1"), [third.node_id.clone()]);
    }

    #[tokio::test]
    async fn test_slow_annotator_times_out_to_fallback() {
        let mut recorder = SessionRecorder::new(SelectorMiner::default(), Arc::new(SlowAnnotator))
            .with_annotation_timeout(Duration::from_millis(20));
        let node = recorder.record_event(&sample_event()).await;
        assert_eq!(node.intent.confidence, 0.1);
        assert_eq!(node.intent.summary, "click → button submit");
        assert!(recorder.graph().contains("evt-1"));
    }

    #[tokio::test]
    async fn test_inferred_intent_is_attached() {
        let mut recorder = SessionRecorder::new(SelectorMiner::default(), Arc::new(EchoAnnotator));
        let node = recorder.record_event(&sample_event()).await;
        assert_eq!(node.intent.summary, "do click");
        assert_eq!(node.intent.semantic_action.as_deref(), Some("submit order"));
    }

    #[tokio::test]
    async fn test_recorder_from_offline_config() {
        let mut config = Config::default();
        config.annotator.provider = "offline".to_string();
        let mut recorder = SessionRecorder::from_config(&config);
        let node = recorder.record_event(&json!({ "category": "goto" })).await;
        assert_eq!(node.intent.summary, "navigate");
        assert!(node.selectors.is_empty());
    }
}
