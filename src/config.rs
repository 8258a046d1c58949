use crate::error::{PageGenError, Result};
use std::env;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3:8b";

const DEFAULT_MODELS: [&str; 4] = ["llama3:8b", "llama3:70b", "mistral:7b", "gemma:7b"];

fn normalize(endpoint: String) -> String {
    endpoint.trim().trim_end_matches('/').to_string()
}

/// Read-only defaults shared by every request.
///
/// Use [`PageGenConfig::builder()`] to override values, or
/// [`PageGenConfig::from_env()`] to pick them up from `OLLAMA_URL`,
/// `OLLAMA_MODEL` and `OLLAMA_MODELS`.
#[derive(Debug, Clone, PartialEq)]
pub struct PageGenConfig {
    endpoint: String,
    model: String,
    models: Vec<String>,
}

impl Default for PageGenConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

impl PageGenConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> PageGenConfigBuilder {
        PageGenConfigBuilder::default()
    }

    /// Build a config from the environment, falling back to defaults for
    /// anything unset or blank.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();

        if let Some(endpoint) = env::var("OLLAMA_URL").ok().filter(|v| !v.trim().is_empty()) {
            builder = builder.with_endpoint(endpoint);
        }
        if let Some(model) = env::var("OLLAMA_MODEL").ok().filter(|v| !v.trim().is_empty()) {
            builder = builder.with_model(model);
        }
        if let Ok(raw) = env::var("OLLAMA_MODELS") {
            let models = parse_model_list(&raw);
            if !models.is_empty() {
                builder = builder.with_models(models);
            }
        }

        builder.build()
    }

    /// Ollama endpoint used when a request does not override it.
    pub fn default_endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Model used when a request does not override it.
    pub fn default_model(&self) -> &str {
        &self.model
    }

    /// Models offered to the user for selection.
    pub fn models(&self) -> &[String] {
        &self.models
    }
}

fn parse_model_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(String::from)
        .collect()
}

/// Builder for [`PageGenConfig`].
#[derive(Default)]
pub struct PageGenConfigBuilder {
    config: PageGenConfig,
}

impl PageGenConfigBuilder {
    /// Set the default Ollama endpoint. A trailing `/` is dropped.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = normalize(endpoint.into());
        self
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Replace the list of selectable models.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Validate and build the final [`PageGenConfig`].
    pub fn build(self) -> Result<PageGenConfig> {
        if self.config.endpoint.is_empty() {
            return Err(PageGenError::InvalidConfig(
                "endpoint must not be empty".to_string(),
            ));
        }
        if self.config.model.trim().is_empty() {
            return Err(PageGenError::InvalidConfig(
                "default model must not be empty".to_string(),
            ));
        }
        Ok(self.config)
    }
}
