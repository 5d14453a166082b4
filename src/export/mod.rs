//! Offline export: recorded event files in, flow graph JSON out

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::graph::FlowGraphWire;
use crate::recorder::SessionRecorder;

/// Load raw events from files or glob patterns
///
/// A file holding a JSON array contributes each element; any other JSON
/// value is taken as a single event. Files are read in argument order,
/// glob matches in path order.
pub fn load_events<S: AsRef<str>>(patterns: &[S]) -> Result<Vec<Value>> {
    let mut events = Vec::new();
    for pattern in patterns {
        for path in expand(pattern.as_ref())? {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read events file {}", path.display()))?;
            let data: Value = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse events file {}", path.display()))?;
            match data {
                Value::Array(items) => events.extend(items),
                other => events.push(other),
            }
        }
    }
    log::debug!("Loaded {} event(s)", events.len());
    Ok(events)
}

fn expand(pattern: &str) -> Result<Vec<PathBuf>> {
    let literal = Path::new(pattern);
    if literal.is_file() || !pattern.contains(['*', '?', '[']) {
        return Ok(vec![literal.to_path_buf()]);
    }

    let mut paths: Vec<PathBuf> = glob::glob(pattern)
        .with_context(|| format!("Invalid glob pattern '{}'", pattern))?
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                log::warn!("Glob error: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .collect();
    if paths.is_empty() {
        anyhow::bail!("No files match '{}'", pattern);
    }
    paths.sort();
    Ok(paths)
}

/// Replay events through `recorder` and return the resulting graph
pub async fn export_flow(events: &[Value], recorder: &mut SessionRecorder) -> FlowGraphWire {
    for raw in events {
        recorder.record_event(raw).await;
    }
    recorder.graph().to_wire()
}

/// Write pretty JSON to `output`, or stdout when absent
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    if let Some(path) = output {
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        log::info!("Saved to: {}", path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}
