use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};

use super::wire::{FlowGraphWire, FlowNodeWire};
use crate::error::{ModelerError, Result};
use crate::events::{ActionEvent, FlowIntent};

/// Single node in the flow graph, one per recorded action
#[derive(Debug, Clone, PartialEq)]
pub struct FlowNode {
    /// Same as the event id
    pub node_id: String,
    pub event: ActionEvent,
    /// Selector values, best first
    pub selectors: Vec<String>,
    pub intent: FlowIntent,
    pub metadata: Map<String, Value>,
}

impl FlowNode {
    pub fn new(event: ActionEvent, selectors: Vec<String>, intent: FlowIntent) -> Self {
        Self {
            node_id: event.event_id.clone(),
            event,
            selectors,
            intent,
            metadata: Map::new(),
        }
    }

    pub fn to_wire(&self) -> FlowNodeWire {
        FlowNodeWire::from(self)
    }
}

/// Partial node update applied by [`FlowGraph::update_node`]
#[derive(Debug, Clone, Default)]
pub struct NodeUpdate {
    pub selectors: Option<Vec<String>>,
    pub intent: Option<FlowIntent>,
}

impl NodeUpdate {
    pub fn selectors(selectors: Vec<String>) -> Self {
        Self {
            selectors: Some(selectors),
            intent: None,
        }
    }

    pub fn intent(intent: FlowIntent) -> Self {
        Self {
            selectors: None,
            intent: Some(intent),
        }
    }
}

/// Mutable directed graph assembled during recording
///
/// Every node owns an adjacency entry (possibly empty). Successor lists keep
/// insertion order and never hold duplicates. Not synchronized: callers
/// serialize all mutations of one graph.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    nodes: HashMap<String, FlowNode>,
    edges: HashMap<String, Vec<String>>,
    entry: Option<String>,
    /// Most recently appended node, used to auto-chain sequential events
    tail: Option<String>,
}

impl FlowGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a node, chaining it after the current tail
    pub fn add_node(&mut self, node: FlowNode) {
        let node_id = node.node_id.clone();
        self.nodes.insert(node_id.clone(), node);
        self.edges.entry(node_id.clone()).or_default();

        if self.entry.is_none() {
            self.entry = Some(node_id.clone());
        }
        if let Some(tail) = self.tail.take() {
            if tail != node_id {
                push_unique(self.edges.entry(tail).or_default(), &node_id);
            }
        }
        self.tail = Some(node_id);
    }

    /// Add `source -> target` unless it already exists
    pub fn connect(&mut self, source: &str, target: &str) -> Result<()> {
        self.require(source)?;
        self.require(target)?;
        push_unique(self.edges.entry(source.to_string()).or_default(), target);
        Ok(())
    }

    /// Remove `source -> target`; no-op when the edge is absent
    pub fn remove_edge(&mut self, source: &str, target: &str) {
        if let Some(successors) = self.edges.get_mut(source) {
            successors.retain(|id| id != target);
        }
    }

    /// Replace `source -> old_target` with `source -> new_target` in place
    ///
    /// No-op when `old_target` is not currently a successor of `source`, or
    /// when both targets are the same.
    pub fn rewire(&mut self, source: &str, old_target: &str, new_target: &str) -> Result<()> {
        if old_target == new_target {
            return Ok(());
        }
        let Some(position) = self
            .edges
            .get(source)
            .and_then(|successors| successors.iter().position(|id| id == old_target))
        else {
            return Ok(());
        };
        self.require(new_target)?;

        if let Some(successors) = self.edges.get_mut(source) {
            if successors.iter().any(|id| id == new_target) {
                successors.remove(position);
            } else {
                successors[position] = new_target.to_string();
            }
        }
        Ok(())
    }

    /// Apply a partial update to an existing node
    pub fn update_node(&mut self, node_id: &str, update: NodeUpdate) -> Result<&FlowNode> {
        let node = self
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| ModelerError::NodeNotFound(node_id.to_string()))?;
        if let Some(selectors) = update.selectors {
            node.selectors = selectors;
        }
        if let Some(intent) = update.intent {
            node.intent = intent;
        }
        Ok(node)
    }

    /// Remove every node downstream of `node_id`, keeping `node_id` itself
    ///
    /// Returns the removed ids. Cycle-safe. The entry node is never removed.
    pub fn prune_after(&mut self, node_id: &str) -> Result<Vec<String>> {
        self.require(node_id)?;

        let entry = self.entry.as_deref();
        let mut discard: HashSet<String> = HashSet::new();
        let mut stack: Vec<&str> = vec![node_id];
        while let Some(current) = stack.pop() {
            for next in self.edges.get(current).into_iter().flatten() {
                if next != node_id
                    && Some(next.as_str()) != entry
                    && discard.insert(next.clone())
                {
                    stack.push(next);
                }
            }
        }

        for id in &discard {
            self.nodes.remove(id);
            self.edges.remove(id);
        }
        for successors in self.edges.values_mut() {
            successors.retain(|id| !discard.contains(id));
        }
        if self.tail.as_ref().is_some_and(|tail| discard.contains(tail)) {
            self.tail = Some(node_id.to_string());
        }

        let mut removed: Vec<String> = discard.into_iter().collect();
        removed.sort_unstable();
        if !removed.is_empty() {
            log::debug!("Pruned {} node(s) after '{}'", removed.len(), node_id);
        }
        Ok(removed)
    }

    pub fn get(&self, node_id: &str) -> Option<&FlowNode> {
        self.nodes.get(node_id)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.nodes.contains_key(node_id)
    }

    pub fn entry(&self) -> Option<&str> {
        self.entry.as_deref()
    }

    pub fn tail(&self) -> Option<&str> {
        self.tail.as_deref()
    }

    /// Nodes ordered by event order
    pub fn nodes(&self) -> Vec<&FlowNode> {
        let mut nodes: Vec<&FlowNode> = self.nodes.values().collect();
        nodes.sort_by_key(|node| node.event.order);
        nodes
    }

    pub fn successors(&self, node_id: &str) -> &[String] {
        self.edges.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Copy of the adjacency mapping
    pub fn edges(&self) -> HashMap<String, Vec<String>> {
        self.edges.clone()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn to_wire(&self) -> FlowGraphWire {
        FlowGraphWire {
            entry: self.entry.clone(),
            nodes: self
                .nodes
                .iter()
                .map(|(id, node)| (id.clone(), node.to_wire()))
                .collect(),
            edges: self
                .edges
                .iter()
                .map(|(id, successors)| (id.clone(), successors.clone()))
                .collect(),
        }
    }

    /// Serialize to the wire format as a JSON value
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self.to_wire())?)
    }

    /// Rebuild a graph from its wire form
    ///
    /// The tail cursor is restored to the node with the highest event order.
    pub fn from_wire(wire: FlowGraphWire) -> Result<Self> {
        let mut nodes = HashMap::with_capacity(wire.nodes.len());
        for (key, node) in wire.nodes {
            if key != node.node_id {
                return Err(ModelerError::InvalidGraph(format!(
                    "node stored under '{}' declares id '{}'",
                    key, node.node_id
                )));
            }
            nodes.insert(key, FlowNode::from(node));
        }

        if let Some(entry) = &wire.entry {
            if !nodes.contains_key(entry) {
                return Err(ModelerError::InvalidGraph(format!(
                    "entry '{}' is not a node",
                    entry
                )));
            }
        }

        let mut edges: HashMap<String, Vec<String>> =
            nodes.keys().map(|id| (id.clone(), Vec::new())).collect();
        for (source, successors) in wire.edges {
            let Some(list) = edges.get_mut(&source) else {
                return Err(ModelerError::InvalidGraph(format!(
                    "edge source '{}' is not a node",
                    source
                )));
            };
            for target in successors {
                if !nodes.contains_key(&target) {
                    return Err(ModelerError::InvalidGraph(format!(
                        "edge '{}' -> '{}' targets a missing node",
                        source, target
                    )));
                }
                push_unique(list, &target);
            }
        }

        let tail = nodes
            .values()
            .max_by_key(|node| node.event.order)
            .map(|node| node.node_id.clone());

        Ok(Self {
            nodes,
            edges,
            entry: wire.entry,
            tail,
        })
    }

    fn require(&self, node_id: &str) -> Result<()> {
        if self.nodes.contains_key(node_id) {
            Ok(())
        } else {
            Err(ModelerError::NodeNotFound(node_id.to_string()))
        }
    }
}

impl TryFrom<FlowGraphWire> for FlowGraph {
    type Error = ModelerError;

    fn try_from(wire: FlowGraphWire) -> Result<Self> {
        Self::from_wire(wire)
    }
}

fn push_unique(successors: &mut Vec<String>, target: &str) {
    if !successors.iter().any(|id| id == target) {
        successors.push(target.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::normalize;
    use serde_json::json;

    fn node(id: &str, order: u64) -> FlowNode {
        let event = normalize(
            &json!({ "event_id": id, "category": "click", "payload": { "n": order } }),
            order,
        );
        FlowNode::new(event, vec![format!("#{}", id)], FlowIntent::new(id, 0.2))
    }

    fn path(ids: &[&str]) -> FlowGraph {
        let mut graph = FlowGraph::new();
        for (i, id) in ids.iter().enumerate() {
            graph.add_node(node(id, i as u64 + 1));
        }
        graph
    }

    #[test]
    fn test_add_node_builds_path_graph() {
        let graph = path(&["a", "b", "c", "d"]);
        assert_eq!(graph.entry(), Some("a"));
        assert_eq!(graph.tail(), Some("d"));
        assert_eq!(graph.successors("a"), ["b"]);
        assert_eq!(graph.successors("b"), ["c"]);
        assert_eq!(graph.successors("c"), ["d"]);
        assert!(graph.successors("d").is_empty());
        assert_eq!(graph.len(), 4);
    }

    #[test]
    fn test_two_events_scenario() {
        let graph = path(&["E1", "E2"]);
        let edges = graph.edges();
        assert_eq!(edges["E1"], vec!["E2".to_string()]);
        assert!(edges["E2"].is_empty());
        assert_eq!(graph.entry(), Some("E1"));
    }

    #[test]
    fn test_connect_is_idempotent() {
        let mut graph = path(&["a", "b", "c"]);
        graph.connect("a", "c").unwrap();
        graph.connect("a", "c").unwrap();
        graph.connect("a", "b").unwrap();
        assert_eq!(graph.successors("a"), ["b", "c"]);
    }

    #[test]
    fn test_connect_unknown_node_fails() {
        let mut graph = path(&["a"]);
        let err = graph.connect("a", "ghost").unwrap_err();
        assert!(matches!(err, ModelerError::NodeNotFound(id) if id == "ghost"));
    }

    #[test]
    fn test_remove_edge_and_rewire_are_noops_when_missing() {
        let mut graph = path(&["a", "b", "c"]);
        graph.remove_edge("a", "c");
        graph.remove_edge("ghost", "a");
        graph.rewire("a", "c", "b").unwrap();
        graph.rewire("ghost", "a", "b").unwrap();
        assert_eq!(graph.successors("a"), ["b"]);

        graph.remove_edge("a", "b");
        assert!(graph.successors("a").is_empty());
    }

    #[test]
    fn test_rewire_replaces_in_place() {
        let mut graph = path(&["a", "b", "c", "d"]);
        graph.connect("a", "d").unwrap();
        graph.rewire("a", "b", "c").unwrap();
        assert_eq!(graph.successors("a"), ["c", "d"]);

        // Replacement already present: old edge just disappears
        graph.rewire("a", "c", "d").unwrap();
        assert_eq!(graph.successors("a"), ["d"]);

        // Retry after success is a no-op
        graph.rewire("a", "c", "d").unwrap();
        assert_eq!(graph.successors("a"), ["d"]);

        // Same old and new target keeps the edge
        graph.rewire("a", "d", "d").unwrap();
        assert_eq!(graph.successors("a"), ["d"]);
    }

    #[test]
    fn test_update_node() {
        let mut graph = path(&["a"]);
        graph
            .update_node("a", NodeUpdate::selectors(vec!["#submit".to_string()]))
            .unwrap();
        let updated = graph
            .update_node("a", NodeUpdate::intent(FlowIntent::new("Pay", 0.9)))
            .unwrap();
        assert_eq!(updated.selectors, vec!["#submit"]);
        assert_eq!(updated.intent.summary, "Pay");

        let err = graph.update_node("ghost", NodeUpdate::default()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_prune_after_removes_downstream_only() {
        let mut graph = path(&["E1", "E2"]);
        let removed = graph.prune_after("E1").unwrap();
        assert_eq!(removed, vec!["E2"]);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.entry(), Some("E1"));
        assert_eq!(graph.tail(), Some("E1"));
        assert!(graph.successors("E1").is_empty());
        assert!(!graph.edges().contains_key("E2"));
    }

    #[test]
    fn test_prune_after_branching_graph() {
        // a -> b -> c, a -> d, x -> c
        let mut graph = path(&["a", "b", "c"]);
        graph.add_node(node("d", 4));
        graph.add_node(node("x", 5));
        graph.remove_edge("c", "d");
        graph.remove_edge("d", "x");
        graph.connect("a", "d").unwrap();
        graph.connect("x", "c").unwrap();

        let removed = graph.prune_after("b").unwrap();
        assert_eq!(removed, vec!["c"]);
        assert_eq!(graph.successors("x"), Vec::<String>::new());
        assert_eq!(graph.successors("a"), ["b", "d"]);
        // Tail (x) survived
        assert_eq!(graph.tail(), Some("x"));

        for successors in graph.edges().values() {
            assert!(successors.iter().all(|id| graph.contains(id)));
        }
    }

    #[test]
    fn test_prune_after_survives_cycles() {
        let mut graph = path(&["a", "b", "c"]);
        graph.connect("c", "a").unwrap();
        graph.connect("c", "b").unwrap();
        let removed = graph.prune_after("a").unwrap();
        assert_eq!(removed, vec!["b", "c"]);
        assert!(graph.contains("a"));
        assert!(graph.successors("a").is_empty());
    }

    #[test]
    fn test_prune_after_keeps_entry_reached_by_back_edge() {
        let mut graph = path(&["a", "b", "c"]);
        graph.connect("c", "a").unwrap();
        let removed = graph.prune_after("b").unwrap();
        assert_eq!(removed, vec!["c"]);
        assert_eq!(graph.entry(), Some("a"));
        assert!(graph.contains("a"));
        assert_eq!(graph.successors("a"), ["b"]);
        assert!(graph.successors("b").is_empty());

        let rebuilt = FlowGraph::from_wire(graph.to_wire()).unwrap();
        assert_eq!(rebuilt.entry(), Some("a"));
        assert_eq!(rebuilt.len(), 2);
    }

    #[test]
    fn test_prune_unknown_node_fails() {
        let mut graph = path(&["a"]);
        assert!(graph.prune_after("ghost").unwrap_err().is_not_found());
    }

    #[test]
    fn test_append_after_prune_chains_from_pruned_point() {
        let mut graph = path(&["a", "b", "c"]);
        graph.prune_after("a").unwrap();
        graph.add_node(node("d", 4));
        assert_eq!(graph.successors("a"), ["d"]);
    }

    #[test]
    fn test_nodes_iterate_by_order() {
        let graph = path(&["z", "m", "a"]);
        let ids: Vec<&str> = graph.nodes().iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["z", "m", "a"]);
    }

    #[test]
    fn test_wire_round_trip() {
        let mut graph = path(&["a", "b", "c"]);
        graph.connect("a", "c").unwrap();
        graph
            .update_node(
                "b",
                NodeUpdate::intent(FlowIntent {
                    summary: "Fill email".to_string(),
                    semantic_action: Some("enter email".to_string()),
                    user_value: Some("me@example.com".to_string()),
                    confidence: 0.8,
                }),
            )
            .unwrap();

        let value = graph.to_value().unwrap();
        let wire: FlowGraphWire = serde_json::from_value(value.clone()).unwrap();
        let rebuilt = FlowGraph::try_from(wire).unwrap();

        assert_eq!(rebuilt.entry(), graph.entry());
        assert_eq!(rebuilt.tail(), Some("c"));
        assert_eq!(rebuilt.edges(), graph.edges());
        for original in graph.nodes() {
            let copy = rebuilt.get(&original.node_id).unwrap();
            assert_eq!(copy.selectors, original.selectors);
            assert_eq!(copy.intent, original.intent);
            assert_eq!(copy.event.payload, original.event.payload);
        }
        assert_eq!(rebuilt.to_value().unwrap(), value);
    }

    #[test]
    fn test_from_wire_rejects_dangling_edges() {
        let mut wire = path(&["a"]).to_wire();
        wire.edges.insert("a".to_string(), vec!["ghost".to_string()]);
        let err = FlowGraph::from_wire(wire).unwrap_err();
        assert!(matches!(err, ModelerError::InvalidGraph(_)));

        let mut wire = path(&["a"]).to_wire();
        wire.entry = Some("ghost".to_string());
        assert!(FlowGraph::from_wire(wire).is_err());
    }
}
