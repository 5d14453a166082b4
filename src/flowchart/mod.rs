//! Flow charts: human-readable step lists derived from a flow graph
//!
//! Chart generation and editing sit behind [`FlowChartDesigner`]. Designers
//! only read the graph; they never mutate it.

pub mod heuristic;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use crate::graph::FlowGraph;

pub use heuristic::HeuristicChartDesigner;
pub use types::{ChartHistoryEntry, ChartSource, ExecutionMode, FlowChart, FlowChartStep};

#[async_trait]
pub trait FlowChartDesigner: Send + Sync {
    /// Build a chart for `graph`
    async fn generate(&self, session_id: &str, graph: &FlowGraph) -> FlowChart;

    /// Apply natural-language edit instructions to an existing chart
    ///
    /// Fails with `InvalidInstructions` for blank instructions or an empty chart.
    async fn edit(&self, chart: &FlowChart, instructions: &str) -> Result<FlowChart>;
}
