//! Infrastructure layer for tutorsim.
//!
//! Implementations of the seams defined in `tutorsim-core`: configuration
//! loading with environment overrides, the OpenAI-compatible HTTP provider,
//! and the JSON files holding experiences, transcripts, and exercise records.

pub mod config;
pub mod llm;
pub mod records;
pub mod storage;
