//! Generation service abstraction.

pub mod box_provider;
pub mod collaborator;
pub mod json;
pub mod provider;

pub use box_provider::BoxLlmProvider;
pub use collaborator::{Collaborator, GenerationDefaults, Prompt};
pub use provider::LlmProvider;
