//! Tutoring roles built on the actor runtime.
//!
//! Every role treats the generation service as unreliable: each call has a
//! deterministic fallback, so a failed call never stops the dialogue.

pub mod knowledge;
pub mod monitor;
pub mod orchestrator;
pub mod reflection;
pub mod student;
pub mod teacher;

pub use knowledge::KnowledgeActor;
pub use monitor::MonitorActor;
pub use orchestrator::OrchestratorActor;
pub use reflection::ReflectionActor;
pub use student::StudentActor;
pub use teacher::TeacherActor;

pub const ORCHESTRATOR: &str = "orchestrator";
pub const STUDENT: &str = "student";
pub const TEACHER: &str = "teacher";
pub const MONITOR: &str = "monitor";
pub const KNOWLEDGE: &str = "knowledge";
pub const REFLECTION: &str = "reflection";

/// Render `(speaker, content)` pairs as a plain dialogue, oldest first.
pub(crate) fn render_dialogue<'a, I>(turns: I) -> String
where
    I: IntoIterator<Item = &'a (String, String)>,
{
    turns
        .into_iter()
        .map(|(speaker, content)| format!("{speaker}: {content}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// First alphabetic word of a one-word label reply, lowercased.
pub(crate) fn normalize_emotion(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_alphabetic())
        .find(|word| !word.is_empty())
        .map(str::to_lowercase)
}
