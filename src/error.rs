use thiserror::Error;

/// Errors surfaced by the modeler core.
///
/// Classification and annotation problems never show up here: they are
/// absorbed by the normalizer and the annotators. Only caller mistakes
/// (unknown ids, malformed wire input, empty edit requests) are reported.
#[derive(Error, Debug)]
pub enum ModelerError {
    #[error("Node '{0}' not found in flow graph")]
    NodeNotFound(String),

    #[error("Session '{0}' not found")]
    SessionNotFound(String),

    #[error("No flow chart generated for session '{0}'")]
    FlowChartNotFound(String),

    #[error("Invalid flow graph: {0}")]
    InvalidGraph(String),

    #[error("Invalid flow chart edit: {0}")]
    InvalidInstructions(String),

    #[error("Failed to encode or decode JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelerError {
    /// Whether the error is a lookup failure the boundary should map to "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ModelerError::NodeNotFound(_)
                | ModelerError::SessionNotFound(_)
                | ModelerError::FlowChartNotFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ModelerError>;
