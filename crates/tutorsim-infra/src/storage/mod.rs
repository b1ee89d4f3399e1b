//! File-backed stores for run output.

pub mod experience_bank;
pub mod transcript;

pub use experience_bank::JsonExperienceBank;
pub use transcript::{TranscriptPaths, render_transcript_text, write_transcript};
