//! The generation collaborator as seen by role actors.
//!
//! Wraps a [`BoxLlmProvider`] and turns every failure (provider error, empty
//! text, unparseable structure) into `None`. Call sites substitute their own
//! deterministic fallback, so a flaky service never escapes a handler.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use tutorsim_types::config::LlmConfig;
use tutorsim_types::llm::{CompletionRequest, PromptMessage};

use super::box_provider::BoxLlmProvider;
use super::json::parse_reply;

/// Temperature and token limit applied when a prompt does not set its own.
#[derive(Debug, Clone, Copy)]
pub struct GenerationDefaults {
    pub temperature: f64,
    pub max_tokens: u32,
}

impl From<&LlmConfig> for GenerationDefaults {
    fn from(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

/// A single generation call under construction.
#[derive(Debug, Clone)]
pub struct Prompt {
    purpose: &'static str,
    system: Option<String>,
    messages: Vec<PromptMessage>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
}

impl Prompt {
    /// Start a prompt; `purpose` only labels logs and spans.
    pub fn new(purpose: &'static str) -> Self {
        Self {
            purpose,
            system: None,
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn system(mut self, text: impl Into<String>) -> Self {
        self.system = Some(text.into());
        self
    }

    pub fn user(mut self, text: impl Into<String>) -> Self {
        self.messages.push(PromptMessage::user(text));
        self
    }

    pub fn assistant(mut self, text: impl Into<String>) -> Self {
        self.messages.push(PromptMessage::assistant(text));
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn purpose(&self) -> &'static str {
        self.purpose
    }

    fn into_request(self, defaults: GenerationDefaults) -> CompletionRequest {
        CompletionRequest {
            messages: self.messages,
            system: self.system,
            max_tokens: self.max_tokens.unwrap_or(defaults.max_tokens),
            temperature: Some(self.temperature.unwrap_or(defaults.temperature)),
        }
    }
}

/// Shared, cloneable access to the generation service.
#[derive(Clone)]
pub struct Collaborator {
    provider: Arc<BoxLlmProvider>,
    defaults: GenerationDefaults,
}

impl Collaborator {
    pub fn new(provider: Arc<BoxLlmProvider>, defaults: GenerationDefaults) -> Self {
        Self { provider, defaults }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Generate text. Any failure or blank output yields `None`.
    #[tracing::instrument(
        name = "generate",
        skip_all,
        fields(provider = %self.provider.name(), purpose = prompt.purpose())
    )]
    pub async fn generate(&self, prompt: Prompt) -> Option<String> {
        let request = prompt.into_request(self.defaults);
        match self.provider.complete(&request).await {
            Ok(response) => {
                let text = response.content.trim();
                if text.is_empty() {
                    warn!("generation returned empty text");
                    return None;
                }
                debug!(
                    model = %response.model,
                    input_tokens = response.usage.input_tokens,
                    output_tokens = response.usage.output_tokens,
                    "generation complete"
                );
                Some(text.to_string())
            }
            Err(err) => {
                warn!(error = %err, "generation failed");
                None
            }
        }
    }

    /// Generate and parse a JSON reply. Malformed output yields `None`.
    pub async fn generate_json<T: DeserializeOwned>(&self, prompt: Prompt) -> Option<T> {
        let purpose = prompt.purpose();
        let text = self.generate(prompt).await?;
        match parse_reply(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(purpose, error = %err, "malformed structured reply");
                None
            }
        }
    }
}

impl std::fmt::Debug for Collaborator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborator")
            .field("provider", &self.provider.name())
            .field("defaults", &self.defaults)
            .finish()
    }
}
