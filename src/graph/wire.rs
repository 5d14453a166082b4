//! Wire format for flow graphs
//!
//! ```text
//! { "entry": <nodeId|null>,
//!   "nodes": { <nodeId>: { "node_id", "event": {...}, "selectors", "intent", "metadata" } },
//!   "edges": { <nodeId>: [<nodeId>...] } }
//! ```
//!
//! Key names and nesting are consumed directly by external tooling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::flow_graph::FlowNode;
use crate::events::{ActionEvent, ActionType, BrowserContext, DomSnapshot, FlowIntent};

/// Metadata key holding the full ranked selector candidate list
pub const META_SELECTOR_CANDIDATES: &str = "selector_candidates";
/// Metadata key holding the event timestamp (RFC 3339)
pub const META_OCCURRED_AT: &str = "occurred_at";
/// Metadata key holding the captured DOM snapshot
pub const META_DOM_SNAPSHOT: &str = "dom_snapshot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowGraphWire {
    pub entry: Option<String>,
    #[serde(default)]
    pub nodes: BTreeMap<String, FlowNodeWire>,
    #[serde(default)]
    pub edges: BTreeMap<String, Vec<String>>,
}

impl FlowGraphWire {
    pub fn empty() -> Self {
        Self {
            entry: None,
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowNodeWire {
    pub node_id: String,
    pub event: ActionEventWire,
    #[serde(default)]
    pub selectors: Vec<String>,
    pub intent: FlowIntent,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

/// Event projection carried on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEventWire {
    pub event_id: String,
    pub order: u64,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub url: String,
    pub frame: Option<String>,
    pub title: Option<String>,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl From<&ActionEvent> for ActionEventWire {
    fn from(event: &ActionEvent) -> Self {
        Self {
            event_id: event.event_id.clone(),
            order: event.order,
            action_type: event.action_type,
            url: event.context.url.clone(),
            frame: event.context.frame.clone(),
            title: event.context.title.clone(),
            payload: event.payload.clone(),
        }
    }
}

impl From<&FlowNode> for FlowNodeWire {
    fn from(node: &FlowNode) -> Self {
        Self {
            node_id: node.node_id.clone(),
            event: ActionEventWire::from(&node.event),
            selectors: node.selectors.clone(),
            intent: node.intent.clone(),
            metadata: node.metadata.clone(),
        }
    }
}

impl From<FlowNodeWire> for FlowNode {
    /// Rebuild a node; timestamp and DOM snapshot come back from metadata when present
    fn from(wire: FlowNodeWire) -> Self {
        let occurred_at = wire
            .metadata
            .get(META_OCCURRED_AT)
            .and_then(Value::as_str)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);

        let dom_snapshot = wire
            .metadata
            .get(META_DOM_SNAPSHOT)
            .and_then(|raw| serde_json::from_value::<DomSnapshot>(raw.clone()).ok());

        let event = ActionEvent {
            event_id: wire.event.event_id,
            order: wire.event.order,
            occurred_at,
            action_type: wire.event.action_type,
            context: BrowserContext {
                url: wire.event.url,
                frame: wire.event.frame,
                title: wire.event.title,
            },
            dom_snapshot,
            payload: wire.event.payload,
        };

        FlowNode {
            node_id: wire.node_id,
            event,
            selectors: wire.selectors,
            intent: wire.intent,
            metadata: wire.metadata,
        }
    }
}
