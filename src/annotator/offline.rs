use async_trait::async_trait;

use super::{Annotation, FallbackReason, IntentAnnotator};
use crate::events::ActionEvent;

/// Annotator used when no inference provider is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineAnnotator;

#[async_trait]
impl IntentAnnotator for OfflineAnnotator {
    async fn annotate(&self, event: &ActionEvent) -> Annotation {
        Annotation::fallback(event, FallbackReason::MissingCredentials)
    }
}
