//! Canonical browser action events
//!
//! Raw instrumentation payloads are loosely typed. This module defines the
//! canonical records the rest of the pipeline works on and the normalizer
//! that produces them.

pub mod normalizer;
pub mod types;

pub use normalizer::{normalize, resolve_action_type};
pub use types::{ActionEvent, ActionType, BrowserContext, DomSnapshot, FlowIntent};
