//! Intent annotation
//!
//! Annotators describe why an action was performed. They are total: every
//! failure is folded into [`Annotation::Fallback`] with a low-confidence
//! intent derived from the event itself, so recording never blocks on them.

pub mod claude;
pub mod offline;
pub mod parsing;

use async_trait::async_trait;
use std::fmt;

use crate::events::{ActionEvent, FlowIntent};

pub use claude::ClaudeAnnotator;
pub use offline::OfflineAnnotator;

/// Why an annotator fell back to the heuristic intent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    /// No API key configured
    MissingCredentials,
    /// Request failed or the provider returned an error status
    Transport,
    /// Provider answered but the content could not be parsed
    MalformedResponse,
    /// Annotation exceeded its time budget
    Timeout,
}

impl FallbackReason {
    /// Confidence attached to the fallback intent
    pub fn confidence(&self) -> f64 {
        match self {
            FallbackReason::MissingCredentials => 0.2,
            FallbackReason::Transport => 0.1,
            FallbackReason::MalformedResponse => 0.3,
            FallbackReason::Timeout => 0.1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::MissingCredentials => "missing-api-key",
            FallbackReason::Transport => "transport-error",
            FallbackReason::MalformedResponse => "malformed-response",
            FallbackReason::Timeout => "timeout",
        }
    }
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of annotating one event
#[derive(Debug, Clone, PartialEq)]
pub enum Annotation {
    /// Genuine inference from the provider
    Inferred(FlowIntent),
    /// Heuristic intent used in place of an inference
    Fallback {
        intent: FlowIntent,
        reason: FallbackReason,
    },
}

impl Annotation {
    /// Build the fallback for `event`: summary from its type and DOM target
    pub fn fallback(event: &ActionEvent, reason: FallbackReason) -> Self {
        Annotation::Fallback {
            intent: FlowIntent::new(event.short_description(), reason.confidence()),
            reason,
        }
    }

    pub fn intent(&self) -> &FlowIntent {
        match self {
            Annotation::Inferred(intent) => intent,
            Annotation::Fallback { intent, .. } => intent,
        }
    }

    pub fn into_intent(self) -> FlowIntent {
        match self {
            Annotation::Inferred(intent) => intent,
            Annotation::Fallback { intent, .. } => intent,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Annotation::Fallback { .. })
    }
}

/// Annotates action events with a natural-language intent
#[async_trait]
pub trait IntentAnnotator: Send + Sync {
    /// Never fails; problems degrade to [`Annotation::Fallback`]
    async fn annotate(&self, event: &ActionEvent) -> Annotation;
}
