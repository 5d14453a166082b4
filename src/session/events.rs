/// Session lifecycle events for live subscribers
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    SessionCreated {
        session_id: String,
        url: Option<String>,
    },
    NodeRecorded {
        session_id: String,
        node_id: String,
        order: u64,
    },
    NodeUpdated {
        session_id: String,
        node_id: String,
    },
    GraphPruned {
        session_id: String,
        after: String,
        removed: Vec<String>,
    },
    FlowChartUpdated {
        session_id: String,
        steps: usize,
    },
}

impl SessionEvent {
    pub fn session_id(&self) -> &str {
        match self {
            SessionEvent::SessionCreated { session_id, .. }
            | SessionEvent::NodeRecorded { session_id, .. }
            | SessionEvent::NodeUpdated { session_id, .. }
            | SessionEvent::GraphPruned { session_id, .. }
            | SessionEvent::FlowChartUpdated { session_id, .. } => session_id,
        }
    }
}
