//! Shared domain types for tutorsim.
//!
//! Message envelopes, conversation records, experience and knowledge records,
//! generation request types, and configuration. Zero infrastructure
//! dependencies -- only serde, uuid, chrono, thiserror.

pub mod config;
pub mod conversation;
pub mod error;
pub mod experience;
pub mod knowledge;
pub mod llm;
pub mod message;
