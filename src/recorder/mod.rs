//! Recorder module turning raw browser telemetry into flow graph nodes
//!
//! This module provides:
//! - Selector mining to rank candidate element selectors
//! - Session recording to normalize, annotate and append events

pub mod selector_miner;
pub mod session_recorder;

pub use selector_miner::{SelectorCandidate, SelectorMiner, SelectorOrigin, SelectorWeights};
pub use session_recorder::SessionRecorder;
