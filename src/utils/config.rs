use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::recorder::selector_miner::SelectorWeights;

/// Environment variable prefix for overrides
const ENV_PREFIX: &str = "FLOW_MODELER_";

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Selector miner heuristic weights
    pub selector_weights: SelectorWeights,

    /// Intent annotator settings
    pub annotator: AnnotatorConfig,
}

/// Intent annotator settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    /// "anthropic" or "offline"
    pub provider: String,

    /// Default model when `model_env` is unset
    pub model: String,

    /// Variable holding the API key
    pub api_key_env: String,

    /// Variable overriding `model`
    pub model_env: String,

    /// Provider base URL
    pub api_base: String,

    pub max_tokens: u32,

    /// Upper bound for one annotation, request included (ms)
    pub timeout_ms: u64,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-5-20250929".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            model_env: "ANTHROPIC_MODEL".to_string(),
            api_base: "https://api.anthropic.com".to_string(),
            max_tokens: 1024,
            timeout_ms: 10_000,
        }
    }
}

impl AnnotatorConfig {
    pub fn is_offline(&self) -> bool {
        self.provider.eq_ignore_ascii_case("offline")
    }
}

impl Config {
    /// Load a YAML config file; missing keys keep their defaults
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Defaults with `FLOW_MODELER_*` environment overrides applied
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Apply overrides from a variable lookup; unparsable values are ignored
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name))
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let set_f64 = |target: &mut f64, name: &str| {
            if let Some(value) = get(name).and_then(|v| v.parse().ok()) {
                *target = value;
            }
        };

        set_f64(&mut self.selector_weights.id, "WEIGHT_ID");
        set_f64(&mut self.selector_weights.role, "WEIGHT_ROLE");
        set_f64(&mut self.selector_weights.text, "WEIGHT_TEXT");
        set_f64(&mut self.selector_weights.css, "WEIGHT_CSS");

        if let Some(provider) = get("ANNOTATOR") {
            self.annotator.provider = provider.to_lowercase();
        }
        if let Some(api_base) = get("API_BASE") {
            self.annotator.api_base = api_base;
        }
        if let Some(timeout) = get("ANNOTATION_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.annotator.timeout_ms = timeout;
        }
        if let Some(max_tokens) = get("MAX_TOKENS").and_then(|v| v.parse().ok()) {
            self.annotator.max_tokens = max_tokens;
        }
    }
}
