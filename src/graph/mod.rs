//! Flow graph assembled during recording
//!
//! - [`FlowGraph`]: mutable directed graph with append/rewire/prune
//! - [`wire`]: the JSON shape external tooling consumes

pub mod flow_graph;
pub mod wire;

pub use flow_graph::{FlowGraph, FlowNode, NodeUpdate};
pub use wire::{ActionEventWire, FlowGraphWire, FlowNodeWire};
