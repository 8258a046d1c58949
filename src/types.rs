use crate::config::PageGenConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One user query, resolved against the config defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    query: String,
    endpoint: String,
    model: String,
    dark_mode: bool,
    want_images: bool,
    thinking: bool,
}

impl GenerationRequest {
    /// Create a request for `query` using the config's default endpoint and model.
    pub fn new(query: impl Into<String>, config: &PageGenConfig) -> Self {
        Self {
            query: query.into(),
            endpoint: config.default_endpoint().to_string(),
            model: config.default_model().to_string(),
            dark_mode: false,
            want_images: false,
            thinking: false,
        }
    }

    /// Build a request from routing-layer parameters.
    ///
    /// Returns `None` when `q` is missing or blank, i.e. the caller should
    /// show the empty search form instead of generating. Blank overrides fall
    /// back to the config defaults.
    pub fn from_params(params: &HashMap<String, String>, config: &PageGenConfig) -> Option<Self> {
        let get = |key: &str| params.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let query = get("q")?;
        let mut request = Self::new(query, config)
            .with_dark_mode(get("theme") == Some("dark"))
            .with_images(get("images") == Some("true"))
            .with_thinking(get("thinking_model") == Some("true"));

        if let Some(endpoint) = get("ollama_url") {
            request = request.with_endpoint(endpoint);
        }
        if let Some(model) = get("model") {
            request = request.with_model(model);
        }
        Some(request)
    }

    /// Override the Ollama endpoint. A trailing `/` is dropped.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_dark_mode(mut self, enabled: bool) -> Self {
        self.dark_mode = enabled;
        self
    }

    pub fn with_images(mut self, enabled: bool) -> Self {
        self.want_images = enabled;
        self
    }

    /// Force `<think>` extraction regardless of the model name.
    pub fn with_thinking(mut self, enabled: bool) -> Self {
        self.thinking = enabled;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn want_images(&self) -> bool {
        self.want_images
    }

    pub fn thinking(&self) -> bool {
        self.thinking
    }

    /// Theme name as shown in the debug log and passed to templates.
    pub fn theme(&self) -> &'static str {
        if self.dark_mode {
            "dark"
        } else {
            "light"
        }
    }
}

/// One NDJSON record from Ollama's streaming `/api/generate`.
///
/// Token counts are only meaningful on the record where `done` is true.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StreamChunk {
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
}

/// Token usage reported by the final chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub response_tokens: u64,
}

/// Text accumulated from a response stream.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    pub text: String,
    pub last_chunk: Option<StreamChunk>,
    pub saw_final: bool,
    /// `None` unless the last decoded chunk was final.
    pub usage: Option<TokenUsage>,
}

/// Everything the rendering layer needs to display one generated page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    pub html: String,
    pub think_text: String,
    pub prompt_tokens: Option<u64>,
    pub response_tokens: Option<u64>,
    pub debug_log: String,
    pub failure_note: Option<String>,
}

impl GenerationResult {
    /// A result carrying a short HTML error message in place of the page.
    pub fn placeholder(html: impl Into<String>, note: impl Into<String>, debug_log: String) -> Self {
        Self {
            html: html.into(),
            think_text: String::new(),
            prompt_tokens: None,
            response_tokens: None,
            debug_log,
            failure_note: Some(note.into()),
        }
    }
}
