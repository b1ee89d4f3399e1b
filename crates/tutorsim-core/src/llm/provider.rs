//! LlmProvider trait definition.
//!
//! The single seam to the external generation service. Uses RPITIT for
//! `complete`; [`super::box_provider::BoxLlmProvider`] erases the type for
//! runtime selection.

use tutorsim_types::llm::{CompletionRequest, CompletionResponse, LlmError};

/// Trait for text-generation backends.
///
/// Implementations live in tutorsim-infra (e.g., `OpenAiCompatibleProvider`).
pub trait LlmProvider: Send + Sync {
    /// Human-readable provider name (e.g., "openai-compatible").
    fn name(&self) -> &str;

    /// Send a completion request and receive the full response.
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl std::future::Future<Output = Result<CompletionResponse, LlmError>> + Send;
}
