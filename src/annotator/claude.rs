//! Anthropic Messages API annotator
//!
//! Sends one event per request and expects a small JSON object back:
//! `{"summary": str, "semantic_action": str|null, "user_value": str|null, "confidence": float}`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::parsing::{extract_text_blocks, loads_best_effort};
use super::{Annotation, FallbackReason, IntentAnnotator};
use crate::events::{ActionEvent, FlowIntent};
use crate::utils::config::AnnotatorConfig;

const ANTHROPIC_VERSION: &str = "2023-06-01";

const SYSTEM_PROMPT: &str = "You are assisting a browser automation engineer. \
Summarize the user's intent for the following browser event and decide whether the action \
should be described semantically or via a DOM selector. Reply with JSON: \
{\"summary\": str, \"semantic_action\": str|null, \"user_value\": str|null, \"confidence\": float}.";

/// Annotator backed by Claude
#[derive(Debug, Clone)]
pub struct ClaudeAnnotator {
    client: reqwest::Client,
    api_key: Option<String>,
    api_base: String,
    model: String,
    max_tokens: u32,
}

impl ClaudeAnnotator {
    /// Build from config, reading the API key and model override from the environment
    pub fn from_config(config: &AnnotatorConfig) -> Self {
        let api_key = read_env(&config.api_key_env);
        let mut annotator = Self::new(api_key, config);
        if let Some(model) = read_env(&config.model_env) {
            annotator.model = model;
        }
        annotator
    }

    /// Build with an explicit key (`None` means every call falls back)
    pub fn new(api_key: Option<String>, config: &AnnotatorConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()
                .unwrap_or_default(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    fn build_request(&self, event: &ActionEvent) -> Value {
        let dom = event
            .dom_snapshot
            .as_ref()
            .map(|dom| {
                json!({
                    "tag": dom.tag,
                    "id": dom.id,
                    "classes": dom.classes,
                    "role": dom.role,
                    "name": dom.name,
                    "text": dom.text,
                })
                .to_string()
            })
            .unwrap_or_default();

        let user_content = format!(
            "Event type: {}\nURL: {}\nDOM: {}\nPayload: {}",
            event.action_type,
            event.context.url,
            dom,
            Value::Object(event.payload.clone())
        );

        json!({
            "model": self.model,
            "max_tokens": self.max_tokens,
            "system": SYSTEM_PROMPT,
            "messages": [
                { "role": "user", "content": [ { "type": "text", "text": user_content } ] }
            ]
        })
    }

    async fn call(&self, api_key: &str, request: &Value) -> Result<Value> {
        let url = format!("{}/v1/messages", self.api_base);
        let resp = self
            .client
            .post(url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("anthropic api error ({}): {}", status, text));
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl IntentAnnotator for ClaudeAnnotator {
    async fn annotate(&self, event: &ActionEvent) -> Annotation {
        let Some(api_key) = self.api_key.as_deref() else {
            return Annotation::fallback(event, FallbackReason::MissingCredentials);
        };

        let request = self.build_request(event);
        let body = match self.call(api_key, &request).await {
            Ok(body) => body,
            Err(e) => {
                log::error!("Claude annotation failed for event {}: {}", event.event_id, e);
                return Annotation::fallback(event, FallbackReason::Transport);
            }
        };

        match parse_intent(&body, &event.short_description()) {
            Ok(intent) => Annotation::Inferred(intent),
            Err(e) => {
                log::warn!(
                    "Failed to parse Claude response for event {}: {}",
                    event.event_id,
                    e
                );
                Annotation::fallback(event, FallbackReason::MalformedResponse)
            }
        }
    }
}

fn parse_intent(body: &Value, fallback_summary: &str) -> Result<FlowIntent> {
    let content = extract_text_blocks(body);
    if content.is_empty() {
        return Err(anyhow!("no text blocks returned"));
    }
    let parsed = loads_best_effort(&content).map_err(|e| {
        log::debug!("Claude annotation raw content: {}", content);
        e
    })?;
    let object = parsed
        .as_object()
        .ok_or_else(|| anyhow!("expected a JSON object"))?;

    let text = |key: &str| match object.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    };
    let confidence = match object.get("confidence") {
        None | Some(Value::Null) => 0.5,
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.5),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| anyhow!("confidence '{}' is not a number", s))?,
        Some(other) => return Err(anyhow!("confidence has unexpected type: {}", other)),
    };

    Ok(FlowIntent {
        summary: text("summary").unwrap_or_else(|| fallback_summary.to_string()),
        semantic_action: text("semantic_action"),
        user_value: text("user_value"),
        confidence: confidence.clamp(0.0, 1.0),
    })
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::normalize;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn click_event() -> ActionEvent {
        normalize(
            &json!({
                "event_id": "evt-1",
                "category": "click",
                "url": "https://example.com",
                "dom": { "tag": "button", "attributes": { "id": "submit" }, "innerText": "Submit" }
            }),
            1,
        )
    }

    fn config(api_base: &str) -> AnnotatorConfig {
        AnnotatorConfig {
            api_base: api_base.to_string(),
            timeout_ms: 2_000,
            ..AnnotatorConfig::default()
        }
    }

    fn text_response(text: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "content": [ { "type": "text", "text": text } ]
        }))
    }

    #[tokio::test]
    async fn test_missing_credentials_fall_back_without_network() {
        let annotator = ClaudeAnnotator::new(None, &config("http://127.0.0.1:9"));
        assert!(!annotator.has_credentials());
        let annotation = annotator.annotate(&click_event()).await;
        assert_eq!(
            annotation,
            Annotation::Fallback {
                intent: FlowIntent::new("click → button submit", 0.2),
                reason: FallbackReason::MissingCredentials,
            }
        );
    }

    #[tokio::test]
    async fn test_inferred_intent() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(text_response(
                "```json\n{\"summary\": \"Submit the order\", \"semantic_action\": \"submit order\", \"user_value\": null, \"confidence\": 1.7}\n```",
            ))
            .mount(&server)
            .await;

        let annotator = ClaudeAnnotator::new(Some("test-key".to_string()), &config(&server.uri()));
        let annotation = annotator.annotate(&click_event()).await;
        assert!(!annotation.is_fallback());
        let intent = annotation.into_intent();
        assert_eq!(intent.summary, "Submit the order");
        assert_eq!(intent.semantic_action.as_deref(), Some("submit order"));
        assert!(intent.user_value.is_none());
        assert_eq!(intent.confidence, 1.0);
    }

    #[tokio::test]
    async fn test_server_error_degrades_to_transport_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let annotator = ClaudeAnnotator::new(Some("k".to_string()), &config(&server.uri()));
        let annotation = annotator.annotate(&click_event()).await;
        assert!(matches!(
            annotation,
            Annotation::Fallback { reason: FallbackReason::Transport, .. }
        ));
        assert_eq!(annotation.intent().confidence, 0.1);
    }

    #[tokio::test]
    async fn test_unparseable_content_degrades_to_malformed_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(text_response("I would rather not answer in JSON."))
            .mount(&server)
            .await;

        let annotator = ClaudeAnnotator::new(Some("k".to_string()), &config(&server.uri()));
        let annotation = annotator.annotate(&click_event()).await;
        assert_eq!(annotation.intent().confidence, 0.3);
        assert_eq!(annotation.intent().summary, "click → button submit");
    }

    #[test]
    fn test_parse_intent_defaults() {
        let body = json!({ "content": [ { "type": "text", "text": "{\"user_value\": 42}" } ] });
        let intent = parse_intent(&body, "input").unwrap();
        assert_eq!(intent.summary, "input");
        assert_eq!(intent.user_value.as_deref(), Some("42"));
        assert_eq!(intent.confidence, 0.5);
    }

    #[test]
    fn test_request_shape() {
        let annotator = ClaudeAnnotator::new(None, &AnnotatorConfig::default());
        let request = annotator.build_request(&click_event());
        assert_eq!(request["model"], AnnotatorConfig::default().model);
        let text = request["messages"][0]["content"][0]["text"].as_str().unwrap();
        assert!(text.starts_with("Event type: click\nURL: https://example.com"));
    }
}
