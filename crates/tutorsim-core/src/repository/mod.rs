//! Repository trait definitions ("ports") implemented by tutorsim-infra.

pub mod experience;

pub use experience::ExperienceStore;
