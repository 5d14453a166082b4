//! Session store
//!
//! Holds independent recording sessions, each owning its recorder, graph,
//! raw event log and optional flow chart. Every session sits behind its own
//! async mutex so events of one session are applied strictly in sequence
//! while different sessions progress in parallel.

pub mod events;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};
use uuid::Uuid;

use crate::error::{ModelerError, Result};
use crate::flowchart::{FlowChart, FlowChartDesigner};
use crate::graph::{FlowGraphWire, FlowNodeWire, NodeUpdate};
use crate::recorder::SessionRecorder;
use crate::utils::config::Config;

pub use events::SessionEvent;

/// Events buffered per subscriber before the slowest one starts lagging
const EVENT_BUFFER: usize = 100;

/// Builds a fresh recorder for each new session
pub type RecorderFactory = Arc<dyn Fn() -> SessionRecorder + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionMetadata {
    pub session_id: String,
    pub url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing entry returned by [`SessionStore::list_sessions`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    #[serde(flatten)]
    pub metadata: SessionMetadata,
    pub node_count: usize,
    pub flowchart_generated: bool,
}

/// Point-in-time copy of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    #[serde(flatten)]
    pub metadata: SessionMetadata,
    pub events: Vec<Value>,
    pub graph: FlowGraphWire,
    pub flowchart: Option<FlowChart>,
}

pub struct SessionRecord {
    pub metadata: SessionMetadata,
    pub recorder: SessionRecorder,
    /// Raw payloads in arrival order
    pub events: Vec<Value>,
    pub flowchart: Option<FlowChart>,
}

/// Result of recording one event: the new node and the whole graph after it
#[derive(Debug, Clone, Serialize)]
pub struct RecordedEvent {
    pub node: FlowNodeWire,
    pub graph: FlowGraphWire,
}

pub struct SessionStore {
    factory: RecorderFactory,
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionRecord>>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionStore {
    pub fn new(factory: RecorderFactory) -> Self {
        Self {
            factory,
            sessions: RwLock::new(HashMap::new()),
            events: broadcast::channel(EVENT_BUFFER).0,
        }
    }

    /// Store whose sessions use recorders wired from `config`
    pub fn from_config(config: Config) -> Self {
        Self::new(Arc::new(move || SessionRecorder::from_config(&config)))
    }

    /// Store whose sessions never call an inference provider
    pub fn offline() -> Self {
        Self::new(Arc::new(SessionRecorder::offline))
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    pub async fn create_session(&self, url: Option<String>) -> SessionMetadata {
        let metadata = SessionMetadata {
            session_id: Uuid::new_v4().to_string(),
            url,
            created_at: Utc::now(),
        };
        let record = SessionRecord {
            metadata: metadata.clone(),
            recorder: (self.factory)(),
            events: Vec::new(),
            flowchart: None,
        };
        self.sessions
            .write()
            .await
            .insert(metadata.session_id.clone(), Arc::new(Mutex::new(record)));

        log::info!("Created session {}", metadata.session_id);
        self.emit(SessionEvent::SessionCreated {
            session_id: metadata.session_id.clone(),
            url: metadata.url.clone(),
        });
        metadata
    }

    /// All sessions, newest first
    pub async fn list_sessions(&self) -> Vec<SessionSummary> {
        let records: Vec<Arc<Mutex<SessionRecord>>> =
            self.sessions.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(records.len());
        for record in records {
            let record = record.lock().await;
            summaries.push(SessionSummary {
                metadata: record.metadata.clone(),
                node_count: record.recorder.graph().len(),
                flowchart_generated: record.flowchart.is_some(),
            });
        }
        summaries.sort_by(|a, b| b.metadata.created_at.cmp(&a.metadata.created_at));
        summaries
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionSnapshot> {
        let record = self.record(session_id).await?;
        let record = record.lock().await;
        Ok(SessionSnapshot {
            metadata: record.metadata.clone(),
            events: record.events.clone(),
            graph: record.recorder.graph().to_wire(),
            flowchart: record.flowchart.clone(),
        })
    }

    /// Record one raw event into the session's graph
    pub async fn record_event(&self, session_id: &str, raw: Value) -> Result<RecordedEvent> {
        let record = self.record(session_id).await?;
        let mut record = record.lock().await;

        let node = record.recorder.record_event(&raw).await;
        record.events.push(raw);

        self.emit(SessionEvent::NodeRecorded {
            session_id: session_id.to_string(),
            node_id: node.node_id.clone(),
            order: node.event.order,
        });
        Ok(RecordedEvent {
            node: node.to_wire(),
            graph: record.recorder.graph().to_wire(),
        })
    }

    /// Apply a manual correction to one node
    pub async fn patch_node(
        &self,
        session_id: &str,
        node_id: &str,
        update: NodeUpdate,
    ) -> Result<FlowNodeWire> {
        let record = self.record(session_id).await?;
        let mut record = record.lock().await;
        let node = record
            .recorder
            .graph_mut()
            .update_node(node_id, update)?
            .to_wire();

        self.emit(SessionEvent::NodeUpdated {
            session_id: session_id.to_string(),
            node_id: node_id.to_string(),
        });
        Ok(node)
    }

    /// Drop everything downstream of `node_id`; returns the removed ids
    pub async fn prune_after(&self, session_id: &str, node_id: &str) -> Result<Vec<String>> {
        let record = self.record(session_id).await?;
        let mut record = record.lock().await;
        let removed = record.recorder.graph_mut().prune_after(node_id)?;

        self.emit(SessionEvent::GraphPruned {
            session_id: session_id.to_string(),
            after: node_id.to_string(),
            removed: removed.clone(),
        });
        Ok(removed)
    }

    pub async fn graph_snapshot(&self, session_id: &str) -> Result<FlowGraphWire> {
        let record = self.record(session_id).await?;
        let record = record.lock().await;
        Ok(record.recorder.graph().to_wire())
    }

    /// Generate (or return the stored) flow chart for a session
    ///
    /// An existing chart is kept unless `regenerate` is set.
    pub async fn generate_flowchart(
        &self,
        session_id: &str,
        designer: &dyn FlowChartDesigner,
        regenerate: bool,
    ) -> Result<FlowChart> {
        let record = self.record(session_id).await?;
        let mut record = record.lock().await;
        if let Some(existing) = record.flowchart.as_ref().filter(|_| !regenerate) {
            return Ok(existing.clone());
        }

        let chart = designer.generate(session_id, record.recorder.graph()).await;
        log::info!(
            "Generated flow chart for {} ({} steps)",
            session_id,
            chart.steps.len()
        );
        record.flowchart = Some(chart.clone());
        self.emit(SessionEvent::FlowChartUpdated {
            session_id: session_id.to_string(),
            steps: chart.steps.len(),
        });
        Ok(chart)
    }

    pub async fn edit_flowchart(
        &self,
        session_id: &str,
        designer: &dyn FlowChartDesigner,
        instructions: &str,
    ) -> Result<FlowChart> {
        let record = self.record(session_id).await?;
        let mut record = record.lock().await;
        let current = record
            .flowchart
            .as_ref()
            .ok_or_else(|| ModelerError::FlowChartNotFound(session_id.to_string()))?;

        let edited = designer.edit(current, instructions).await?;
        record.flowchart = Some(edited.clone());
        self.emit(SessionEvent::FlowChartUpdated {
            session_id: session_id.to_string(),
            steps: edited.steps.len(),
        });
        Ok(edited)
    }

    pub async fn flowchart(&self, session_id: &str) -> Result<Option<FlowChart>> {
        let record = self.record(session_id).await?;
        let record = record.lock().await;
        Ok(record.flowchart.clone())
    }

    async fn record(&self, session_id: &str) -> Result<Arc<Mutex<SessionRecord>>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| ModelerError::SessionNotFound(session_id.to_string()))
    }
}
