//! Record browser interactions into editable automation flow graphs
//!
//! Raw events from browser instrumentation are normalized, given ranked
//! selectors and an intent, then appended to a per-session [`FlowGraph`].
//! Graphs export to a stable JSON wire format and can be summarized as
//! flow charts.

pub mod annotator;
pub mod error;
pub mod events;
pub mod export;
pub mod flowchart;
pub mod graph;
pub mod recorder;
pub mod session;
pub mod utils;

// Re-export common items
pub use error::{ModelerError, Result};
pub use events::{normalize, ActionEvent, ActionType, FlowIntent};
pub use graph::{FlowGraph, FlowGraphWire, FlowNode, NodeUpdate};
pub use recorder::SessionRecorder;
pub use session::SessionStore;
